//! Image, Sampler and SampledImage runtime values.
use crate::ty::{ComponentLayout, ImageDim};

use super::aggregate::ArrayVal;
use super::Value;

/// A packed pixel buffer plus the channel layout describing how texels are
/// unpacked into R/G/B/A components.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageVal {
    pub dim: ImageDim,
    pub mipmaps: u32,
    pub comps: ComponentLayout,
    /// Extent per axis, `[width, height, depth]` (1 for unused axes).
    pub extent: [u32; 3],
    /// Packed texels, `extent[0]*extent[1]*extent[2]` entries wide.
    pub data: Vec<u32>,
}
impl ImageVal {
    pub fn new(dim: ImageDim, mipmaps: u32, comps: ComponentLayout, extent: [u32; 3]) -> Self {
        let len = (extent[0] * extent[1] * extent[2]) as usize;
        ImageVal {
            dim,
            mipmaps,
            comps,
            extent,
            data: vec![0; len],
        }
    }

    fn index(&self, x: u32, y: u32, z: u32) -> Option<usize> {
        if x >= self.extent[0] || y >= self.extent[1] || z >= self.extent[2] {
            return None;
        }
        Some(
            (z * self.extent[1] * self.extent[0] + y * self.extent[0] + x) as usize,
        )
    }

    /// Out-of-bounds reads return an all-zero pixel rather than erroring —
    /// image reads are one of the few local-recovery cases the error
    /// policy allows.
    pub fn read(&self, x: u32, y: u32, z: u32) -> ArrayVal {
        let texel = self.index(x, y, z).map(|i| self.data[i]).unwrap_or(0);
        self.unpack(texel)
    }

    /// Writes a texel Array at an integer coordinate. Returns `true` on
    /// success, `false` if the coordinate was out of bounds.
    pub fn write(&mut self, x: u32, y: u32, z: u32, texel: &ArrayVal) -> bool {
        match self.index(x, y, z) {
            Some(i) => {
                self.data[i] = self.pack(texel);
                true
            }
            None => false,
        }
    }

    /// Splits a packed texel word into its enabled channels, in `r, g, b, a`
    /// order. Used both by coordinate-indexed reads and by the external
    /// struct codec, which represents `data` as flat per-channel values
    /// rather than packed words.
    pub fn unpack(&self, texel: u32) -> ArrayVal {
        let bytes = texel.to_le_bytes();
        let mut elements = Vec::with_capacity(self.comps.count as usize);
        for slot in [self.comps.r, self.comps.g, self.comps.b, self.comps.a] {
            if slot == 0 {
                continue;
            }
            let channel = bytes.get((slot - 1) as usize).copied().unwrap_or(0);
            elements.push(Value::from_u32(channel as u32));
        }
        ArrayVal::new(elements)
    }

    /// Inverse of [`Self::unpack`]: folds a channel group back into one
    /// packed texel word.
    pub fn pack(&self, texel: &ArrayVal) -> u32 {
        let mut bytes = [0u8; 4];
        let mut it = texel.elements.iter();
        for slot in [self.comps.r, self.comps.g, self.comps.b, self.comps.a] {
            if slot == 0 {
                continue;
            }
            if let Some(v) = it.next() {
                bytes[(slot - 1) as usize] = v.as_u32().unwrap_or(0) as u8;
            }
        }
        u32::from_le_bytes(bytes)
    }

    /// Extracts integer pixel coordinates from a homogeneous coordinate
    /// array, dividing by the last component when `projected` is set.
    pub fn extract_coords(coords: &ArrayVal, projected: bool) -> Vec<f32> {
        let raw: Vec<f32> = coords
            .elements
            .iter()
            .map(|v| v.as_f32().unwrap_or(0.0))
            .collect();
        if projected {
            if let Some((last, rest)) = raw.split_last() {
                if *last != 0.0 {
                    return rest.iter().map(|c| c / last).collect();
                }
            }
        }
        raw
    }
}

/// LOD-hint-only sampler state.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplerVal {
    pub lod: f32,
}

/// A sampler combined with an image.
#[derive(Clone, Debug, PartialEq)]
pub struct SampledImageVal {
    pub sampler: SamplerVal,
    pub image: ImageVal,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_comps() -> ComponentLayout {
        ComponentLayout {
            r: 1,
            g: 2,
            b: 3,
            a: 0,
            count: 3,
        }
    }

    #[test]
    fn out_of_bounds_read_is_zero() {
        let img = ImageVal::new(ImageDim::TwoD, 1, rgb_comps(), [2, 2, 1]);
        let px = img.read(5, 5, 0);
        assert!(px.elements.iter().all(|v| v.as_u32().unwrap() == 0));
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut img = ImageVal::new(ImageDim::TwoD, 1, rgb_comps(), [2, 2, 1]);
        let texel = ArrayVal::new(vec![
            Value::from_u32(255),
            Value::from_u32(0),
            Value::from_u32(10),
        ]);
        assert!(img.write(1, 1, 0, &texel));
        let px = img.read(1, 1, 0);
        assert_eq!(px.elements[0].as_u32().unwrap(), 255);
        assert_eq!(px.elements[2].as_u32().unwrap(), 10);
    }

    #[test]
    fn projected_coords_divide_by_last_component() {
        let coords = ArrayVal::new(vec![
            Value::from_f32(4.0),
            Value::from_f32(6.0),
            Value::from_f32(2.0),
        ]);
        let out = ImageVal::extract_coords(&coords, true);
        assert_eq!(out, vec![2.0, 3.0]);
    }
}
