//! `InstList`: the ordered, decoded instruction sequence the executor runs
//! against, plus the file-boundary records a multi-file module carries.
use super::{Instruction, SpirvBinary};
use crate::error::AnyResult;

/// A source file boundary: instruction index it starts at, and the path
/// that was in effect from that index onward.
#[derive(Clone, Debug)]
pub struct FileBreak {
    pub inst_idx: usize,
    pub file_path: String,
}

/// Decoded instructions in file order, never reordered, plus an ascending
/// list of file boundaries.
#[derive(Clone, Debug, Default)]
pub struct InstList {
    instrs: Vec<Instruction>,
    breaks: Vec<FileBreak>,
}
impl InstList {
    pub fn new(instrs: Vec<Instruction>, breaks: Vec<FileBreak>) -> Self {
        InstList { instrs, breaks }
    }

    /// Decodes a whole module's word stream, skipping `OpNop`s, with no
    /// file-boundary information (the single-file case).
    pub fn from_binary(bin: &SpirvBinary) -> AnyResult<Self> {
        let mut instrs = Vec::new();
        let mut cursor = bin.instrs()?;
        while let Some(instr) = cursor.next_non_nop()? {
            instrs.push(instr.to_owned());
        }
        Ok(InstList {
            instrs,
            breaks: Vec::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.instrs.len()
    }
    pub fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }
    pub fn get(&self, idx: usize) -> Option<&Instruction> {
        self.instrs.get(idx)
    }

    /// The source file in effect at `idx`, or `None` if the module was not
    /// assembled from more than one file. Breaks are recorded in ascending
    /// `inst_idx` order; the returned path is the one from the latest break
    /// at or before `idx`.
    pub fn get_break(&self, idx: usize) -> Option<&str> {
        if self.breaks.len() <= 1 {
            return None;
        }
        self.breaks
            .iter()
            .rev()
            .find(|b| b.inst_idx <= idx)
            .map(|b| b.file_path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_with_breaks() -> InstList {
        InstList::new(
            vec![],
            vec![
                FileBreak {
                    inst_idx: 0,
                    file_path: "a.vert".to_string(),
                },
                FileBreak {
                    inst_idx: 10,
                    file_path: "b.vert".to_string(),
                },
            ],
        )
    }

    #[test]
    fn get_break_is_monotone_across_ascending_queries() {
        let list = list_with_breaks();
        assert_eq!(list.get_break(0), Some("a.vert"));
        assert_eq!(list.get_break(5), Some("a.vert"));
        assert_eq!(list.get_break(10), Some("b.vert"));
        assert_eq!(list.get_break(100), Some("b.vert"));
    }

    #[test]
    fn single_file_module_has_no_breaks() {
        let list = InstList::new(
            vec![],
            vec![FileBreak {
                inst_idx: 0,
                file_path: "only.vert".to_string(),
            }],
        );
        assert_eq!(list.get_break(3), None);
    }
}
