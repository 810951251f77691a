//! Cooperative matrix: an `Array` specialisation whose elements are
//! partitioned across the invocations of a workgroup.
use crate::error::{InterpError, Result};
use crate::ty::Type;

use super::Value;

#[derive(Clone, Debug, PartialEq)]
pub struct CoopMatrixVal {
    pub rows: u32,
    /// Total element count across every invocation's share, once known.
    /// Left at 0 while `unsized` and no broadcast source has arrived yet.
    pub total_elements: u32,
    /// This invocation's local slice of the matrix.
    pub elements: Vec<Value>,
    /// Cleared the moment `enforce_size` runs.
    pub unsized_: bool,
}
impl CoopMatrixVal {
    pub fn new_unsized(rows: u32) -> Self {
        CoopMatrixVal {
            rows,
            total_elements: 0,
            elements: Vec::new(),
            unsized_: true,
        }
    }
    pub fn new_sized(rows: u32, elements: Vec<Value>) -> Self {
        let total_elements = elements.len() as u32;
        CoopMatrixVal {
            rows,
            total_elements,
            elements,
            unsized_: false,
        }
    }

    /// Copy from another unsized matrix holding exactly one element:
    /// broadcast that element as the sole source value. Otherwise falls
    /// back to a plain elementwise copy when both are already sized.
    pub fn copy_from(&mut self, src: &CoopMatrixVal, inst_idx: Option<usize>) -> Result<()> {
        if src.unsized_ && src.elements.len() == 1 {
            self.elements = vec![src.elements[0].clone()];
            self.unsized_ = true;
            self.total_elements = 0;
            return Ok(());
        }
        if self.elements.len() != src.elements.len() {
            return Err(InterpError::shape_mismatch(
                inst_idx,
                format!(
                    "coop-matrix element count mismatch: {} vs {}",
                    self.elements.len(),
                    src.elements.len()
                ),
            ));
        }
        self.elements = src.elements.clone();
        self.total_elements = src.total_elements;
        self.unsized_ = src.unsized_;
        Ok(())
    }

    /// Partitions `total_elements` into per-invocation shares
    /// `[i*N/K, (i+1)*N/K)` and extends the local element vector to match,
    /// filling any newly-needed slots with copies of the last known
    /// element, or fresh `construct`-ed values of `element_ty` if none exist
    /// yet. Clears `unsized_` once done.
    pub fn enforce_size(
        &mut self,
        invocation: u32,
        num_invocations: u32,
        total_elements: u32,
        element_ty: &Type,
    ) {
        self.total_elements = total_elements;
        let lo = (invocation as u64 * total_elements as u64 / num_invocations as u64) as u32;
        let hi = ((invocation as u64 + 1) * total_elements as u64 / num_invocations as u64) as u32;
        let share = (hi - lo) as usize;

        if self.elements.len() < share {
            let filler = self
                .elements
                .last()
                .cloned()
                .unwrap_or_else(|| Value::construct(element_ty, false));
            self.elements.resize(share, filler);
        } else {
            self.elements.truncate(share);
        }
        self.unsized_ = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enforce_size_splits_elements_evenly() {
        let mut m = CoopMatrixVal::new_unsized(4);
        m.elements.push(Value::from_f32(7.0));
        m.enforce_size(1, 4, 8, &Type::float32());
        assert_eq!(m.elements.len(), 2);
        assert!(!m.unsized_);
    }

    #[test]
    fn enforce_size_fills_new_slots_with_constructed_zero_when_empty() {
        let mut m = CoopMatrixVal::new_unsized(4);
        m.enforce_size(0, 2, 4, &Type::uint32());
        assert_eq!(m.elements.len(), 2);
        assert!(m.elements.iter().all(|v| v.as_u32() == Some(0)));
    }

    #[test]
    fn broadcast_from_single_element_unsized_source() {
        let src = CoopMatrixVal::new_unsized(4);
        let mut src = src;
        src.elements.push(Value::from_f32(3.0));
        let mut dst = CoopMatrixVal::new_unsized(4);
        dst.copy_from(&src, None).unwrap();
        assert_eq!(dst.elements.len(), 1);
        assert!(dst.unsized_);
    }
}
