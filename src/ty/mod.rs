//! Structured descriptors of the shapes a runtime [`Value`](crate::value::Value)
//! can take.
use std::fmt;
use std::rc::Rc;

pub use crate::spirv::StorageClass;

/// Accessors shared by every base. A `Type` is immutable after construction
/// except for the two mutators `replace_sub_element`/`replace_field_type`,
/// used exclusively by `Aggregate::infer_type` to backfill a placeholder
/// element type once the first concrete element is known.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct PointerType {
    pub pointee_ty: Box<Type>,
    pub store_cls: StorageClass,
}
impl fmt::Display for PointerType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ptr<{:?},{}>", self.store_cls, self.pointee_ty)
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct ArrayType {
    pub element_ty: Box<Type>,
    /// `None` means runtime-sized: the element count is inferred from the
    /// first value copied into an instance of this array.
    pub element_count: Option<u32>,
}
impl fmt::Display for ArrayType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.element_count {
            Some(n) => write!(f, "[{}; {}]", self.element_ty, n),
            None => write!(f, "[{}]", self.element_ty),
        }
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct StructMember {
    pub name: Option<String>,
    pub ty: Type,
}

#[derive(PartialEq, Eq, Hash, Clone, Debug, Default)]
pub struct StructType {
    pub name: Option<String>,
    pub members: Vec<StructMember>,
}
impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{} {{ ", name)?;
        } else {
            f.write_str("{ ")?;
        }
        for (i, member) in self.members.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            match &member.name {
                Some(name) => write!(f, "{}: {}", name, member.ty)?,
                None => write!(f, "{}: {}", i, member.ty)?,
            }
        }
        f.write_str(" }")
    }
}

/// Dimensionality of an [`ImageType`].
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum ImageDim {
    OneD,
    TwoD,
    ThreeD,
    Cube,
}

/// Slot → channel-index mapping. `0` means the slot is disabled.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Default)]
pub struct ComponentLayout {
    pub r: u32,
    pub g: u32,
    pub b: u32,
    pub a: u32,
    pub count: u32,
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct ImageType {
    pub dim: ImageDim,
    pub mipmaps: u32,
    pub comps: ComponentLayout,
}
impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Image{:?}<mip={},comps={}>",
            self.dim, self.mipmaps, self.comps.count
        )
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct CoopMatrixType {
    pub rows: u32,
    pub cols: u32,
    pub element_ty: Box<Type>,
}
impl fmt::Display for CoopMatrixType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CoopMatrix<{}x{},{}>", self.rows, self.cols, self.element_ty)
    }
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct FunctionType {
    pub ret_ty: Box<Type>,
    pub param_tys: Vec<Type>,
}
impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "fn(")?;
        for (i, p) in self.param_tys.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", p)?;
        }
        write!(f, ") -> {}", self.ret_ty)
    }
}

macro_rules! declr_ty_accessor {
    ($($name:ident -> $ty:ident,)+) => {
        $(
            pub fn $name(&self) -> bool {
                matches!(self, Type::$ty(..))
            }
        )+
    }
}
macro_rules! declr_ty_downcast {
    ($($name:ident -> $ty:ident($inner_ty:ty),)+) => {
        $(
            pub fn $name(&self) -> Option<&$inner_ty> {
                match self {
                    Type::$ty(x) => Some(x),
                    _ => None,
                }
            }
        )+
    }
}

/// The base taxonomy a runtime value can be shaped by. Equality is
/// structural: same base, same attributes, recursively.
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub enum Type {
    Void,
    Bool,
    Uint { bits: u32 },
    Int { bits: u32 },
    Float { bits: u32 },
    Pointer(PointerType),
    Array(ArrayType),
    Struct(StructType),
    String,
    Image(ImageType),
    Sampler,
    SampledImage,
    CoopMatrix(CoopMatrixType),
    AccelStruct,
    Function(FunctionType),
}
impl Type {
    pub fn uint32() -> Self {
        Self::Uint { bits: 32 }
    }
    pub fn int32() -> Self {
        Self::Int { bits: 32 }
    }
    pub fn float32() -> Self {
        Self::Float { bits: 32 }
    }

    /// True if `self` and `other` share the same base discriminant,
    /// ignoring attributes. Used by `copyFrom`'s "same base" requirement.
    pub fn same_base(&self, other: &Type) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    declr_ty_accessor! {
        is_void -> Void,
        is_bool -> Bool,
        is_pointer -> Pointer,
        is_array -> Array,
        is_struct -> Struct,
        is_string -> String,
        is_image -> Image,
        is_sampler -> Sampler,
        is_sampled_image -> SampledImage,
        is_coop_matrix -> CoopMatrix,
        is_accel_struct -> AccelStruct,
        is_function -> Function,
    }
    pub fn is_uint(&self) -> bool {
        matches!(self, Type::Uint { .. })
    }
    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int { .. })
    }
    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float { .. })
    }
    pub fn is_numeric(&self) -> bool {
        self.is_uint() || self.is_int() || self.is_float()
    }

    declr_ty_downcast! {
        as_pointer -> Pointer(PointerType),
        as_array -> Array(ArrayType),
        as_struct -> Struct(StructType),
        as_image -> Image(ImageType),
        as_coop_matrix -> CoopMatrix(CoopMatrixType),
        as_function -> Function(FunctionType),
    }

    /// Bit width for the numeric bases. `None` for non-numeric bases.
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            Type::Uint { bits } | Type::Int { bits } | Type::Float { bits } => Some(*bits),
            _ => None,
        }
    }

    /// Replace the element type of an `Array`/`CoopMatrix`. Only meaningful
    /// on a placeholder element type; used by `Aggregate::infer_type`.
    pub fn replace_sub_element(&mut self, ty: Type) {
        match self {
            Type::Array(x) => x.element_ty = Box::new(ty),
            Type::CoopMatrix(x) => x.element_ty = Box::new(ty),
            _ => {}
        }
    }
    /// Replace the `index`-th field type of a `Struct`. Used by
    /// `Aggregate::infer_type`.
    ///
    /// Note: the original this was ported from always resolves the inferred
    /// type from the first element regardless of `index` (`&elements[0]`,
    /// never `&elements[index]`) — that looks like a bug, but we preserve
    /// the behaviour rather than silently "fixing" unspecified semantics.
    pub fn replace_field_type(&mut self, index: usize, ty: Type) {
        if let Type::Struct(x) = self {
            if let Some(member) = x.members.get_mut(index) {
                member.ty = ty;
            }
        }
    }

    /// Recursively rewrite every nested type bottom-up with `f`.
    pub fn mutate<F: Fn(Type) -> Type>(self, f: F) -> Type {
        self.mutate_impl(Rc::new(f))
    }
    fn mutate_impl<F: Fn(Type) -> Type>(self, f: Rc<F>) -> Type {
        let out = match self {
            Type::Array(src) => Type::Array(ArrayType {
                element_ty: Box::new(src.element_ty.mutate_impl(f.clone())),
                element_count: src.element_count,
            }),
            Type::Struct(src) => Type::Struct(StructType {
                name: src.name,
                members: src
                    .members
                    .into_iter()
                    .map(|m| StructMember {
                        name: m.name,
                        ty: m.ty.mutate_impl(f.clone()),
                    })
                    .collect(),
            }),
            Type::Pointer(src) => Type::Pointer(PointerType {
                pointee_ty: Box::new(src.pointee_ty.mutate_impl(f.clone())),
                store_cls: src.store_cls,
            }),
            other => other,
        };
        (*f)(out)
    }
}
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Void => f.write_str("void"),
            Type::Bool => f.write_str("bool"),
            Type::Uint { bits } => write!(f, "u{}", bits),
            Type::Int { bits } => write!(f, "i{}", bits),
            Type::Float { bits } => write!(f, "f{}", bits),
            Type::Pointer(x) => x.fmt(f),
            Type::Array(x) => x.fmt(f),
            Type::Struct(x) => x.fmt(f),
            Type::String => f.write_str("string"),
            Type::Image(x) => x.fmt(f),
            Type::Sampler => f.write_str("sampler"),
            Type::SampledImage => f.write_str("sampled_image"),
            Type::CoopMatrix(x) => x.fmt(f),
            Type::AccelStruct => f.write_str("accel_struct"),
            Type::Function(x) => x.fmt(f),
        }
    }
}

/// Promote a half-float bit pattern into the equivalent 32-bit float bit
/// pattern. All primitives are emulated at 32-bit width; this is the
/// conversion that gets a 16-bit value there.
pub fn fp_convert_to_emu(bits: u16, precision: u32) -> u32 {
    assert_eq!(precision, 16, "only half-float promotion is supported");
    half::f16::from_bits(bits).to_f32().to_bits()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_float_one_promotes_to_float_one() {
        assert_eq!(fp_convert_to_emu(0x3C00, 16), 0x3F800000);
    }

    #[test]
    fn same_base_ignores_attributes() {
        assert!(Type::Uint { bits: 32 }.same_base(&Type::Uint { bits: 16 }));
        assert!(!Type::Uint { bits: 32 }.same_base(&Type::Int { bits: 32 }));
    }
}
