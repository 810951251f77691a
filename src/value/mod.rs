//! The runtime value taxonomy: a closed, tagged sum with one uniform
//! contract (construct, copy, reinterp-copy, equals, recursive visit,
//! self-description) dispatched per variant rather than through open
//! inheritance — see the design notes on closed-world polymorphism.
pub mod aggregate;
pub mod coop_matrix;
pub mod image;
pub mod primitive;

use crate::accel::{
    BoxNode, InstanceNode, NodeKind, NodePool, NodeReference, ProceduralNode, RayFlags, Trace,
    TriangleNode,
};
use crate::console::WarnSink;
use crate::error::{InterpError, Result};
use crate::ty::{ComponentLayout, ImageDim, StructType, Type};

pub use aggregate::{ArrayVal, StructVal};
pub use coop_matrix::CoopMatrixVal;
pub use image::{ImageVal, SampledImageVal, SamplerVal};
pub use primitive::PrimitiveWord;

/// An acceleration structure's geometry plus its live per-ray traversal
/// state. Boxed inside `Value` because it is by far the largest variant.
#[derive(Clone, Debug, PartialEq)]
pub struct AccelStructVal {
    pub pool: NodePool,
    pub tlas: NodeReference,
    pub trace: Trace,
}
impl AccelStructVal {
    pub fn new(pool: NodePool, tlas: NodeReference) -> Self {
        let trace = Trace::new(&pool, tlas, RayFlags::NONE);
        AccelStructVal { pool, tlas, trace }
    }

    pub fn begin_trace(&mut self, ray_flags: RayFlags) {
        self.trace = Trace::new(&self.pool, self.tlas, ray_flags);
    }
}

#[derive(Clone, Debug, PartialEq)]
enum ValueData {
    Primitive(PrimitiveWord),
    Array(ArrayVal),
    Struct(StructVal),
    CoopMatrix(CoopMatrixVal),
    String(String),
    Image(ImageVal),
    Sampler(SamplerVal),
    SampledImage(SampledImageVal),
    AccelStruct(Box<AccelStructVal>),
}

/// External `uvec2` form of a [`NodeReference`]: `(kind, pool_index)`.
fn node_ref_to_value(nr: NodeReference) -> Value {
    Value::array(
        Type::uint32(),
        vec![Value::from_u32(nr.kind as u32), Value::from_u32(nr.pool_index as u32)],
    )
}
fn node_ref_from_value(v: &Value) -> Option<NodeReference> {
    let a = v.as_array()?;
    let kind = NodeKind::from_u32(a.elements.get(0)?.as_u32()?)?;
    let pool_index = a.elements.get(1)?.as_u32()? as usize;
    Some(NodeReference { kind, pool_index })
}

fn vec3_to_value(v: [f32; 3]) -> Value {
    Value::array(Type::float32(), v.iter().map(|x| Value::from_f32(*x)).collect())
}
fn vec3_from_value(v: &Value) -> Option<[f32; 3]> {
    let a = v.as_array()?;
    if a.elements.len() != 3 {
        return None;
    }
    Some([
        a.elements[0].as_f32()?,
        a.elements[1].as_f32()?,
        a.elements[2].as_f32()?,
    ])
}

/// Row-major 3x4 transform, flattened to 12 entries.
fn transform_to_value(t: [[f32; 4]; 3]) -> Value {
    Value::array(
        Type::float32(),
        t.iter().flat_map(|row| row.iter().map(|x| Value::from_f32(*x))).collect(),
    )
}
fn transform_from_value(v: &Value) -> Option<[[f32; 4]; 3]> {
    let a = v.as_array()?;
    if a.elements.len() != 12 {
        return None;
    }
    let mut out = [[0.0f32; 4]; 3];
    for r in 0..3 {
        for c in 0..4 {
            out[r][c] = a.elements[r * 4 + c].as_f32()?;
        }
    }
    Some(out)
}

fn vertices_to_value(v: [[f32; 3]; 3]) -> Value {
    Value::array(
        Type::float32(),
        v.iter().flat_map(|p| p.iter().map(|x| Value::from_f32(*x))).collect(),
    )
}
fn vertices_from_value(v: &Value) -> Option<[[f32; 3]; 3]> {
    let a = v.as_array()?;
    if a.elements.len() != 9 {
        return None;
    }
    let mut out = [[0.0f32; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = a.elements[i * 3 + j].as_f32()?;
        }
    }
    Some(out)
}

fn box_node_to_value(n: &BoxNode) -> Value {
    Value::struct_of(
        Type::Struct(StructType::default()),
        vec![
            ("min".to_string(), vec3_to_value(n.min)),
            ("max".to_string(), vec3_to_value(n.max)),
            (
                "children".to_string(),
                Value::array(
                    Type::uint32(),
                    n.children.iter().map(|c| node_ref_to_value(*c)).collect(),
                ),
            ),
        ],
    )
}
fn box_node_from_value(v: &Value) -> Option<BoxNode> {
    let f = v.as_struct()?;
    Some(BoxNode {
        min: vec3_from_value(f.get("min")?)?,
        max: vec3_from_value(f.get("max")?)?,
        children: f
            .get("children")?
            .as_array()?
            .elements
            .iter()
            .filter_map(node_ref_from_value)
            .collect(),
    })
}

fn instance_node_to_value(n: &InstanceNode) -> Value {
    Value::struct_of(
        Type::Struct(StructType::default()),
        vec![
            ("root".to_string(), node_ref_to_value(n.root)),
            ("transform".to_string(), transform_to_value(n.transform)),
            ("custom_index".to_string(), Value::from_u32(n.custom_index)),
        ],
    )
}
fn instance_node_from_value(v: &Value) -> Option<InstanceNode> {
    let f = v.as_struct()?;
    Some(InstanceNode {
        root: node_ref_from_value(f.get("root")?)?,
        transform: transform_from_value(f.get("transform")?)?,
        custom_index: f.get("custom_index")?.as_u32()?,
    })
}

fn triangle_node_to_value(n: &TriangleNode) -> Value {
    Value::struct_of(
        Type::Struct(StructType::default()),
        vec![
            ("vertices".to_string(), vertices_to_value(n.vertices)),
            ("opaque".to_string(), Value::from_bool(n.opaque)),
            ("geometry_index".to_string(), Value::from_u32(n.geometry_index)),
            ("primitive_index".to_string(), Value::from_u32(n.primitive_index)),
        ],
    )
}
fn triangle_node_from_value(v: &Value) -> Option<TriangleNode> {
    let f = v.as_struct()?;
    Some(TriangleNode {
        vertices: vertices_from_value(f.get("vertices")?)?,
        opaque: f.get("opaque")?.as_bool()?,
        geometry_index: f.get("geometry_index")?.as_u32()?,
        primitive_index: f.get("primitive_index")?.as_u32()?,
    })
}

fn procedural_node_to_value(n: &ProceduralNode) -> Value {
    Value::struct_of(
        Type::Struct(StructType::default()),
        vec![
            ("min".to_string(), vec3_to_value(n.min)),
            ("max".to_string(), vec3_to_value(n.max)),
            ("opaque".to_string(), Value::from_bool(n.opaque)),
            ("geometry_index".to_string(), Value::from_u32(n.geometry_index)),
            ("primitive_index".to_string(), Value::from_u32(n.primitive_index)),
        ],
    )
}
fn procedural_node_from_value(v: &Value) -> Option<ProceduralNode> {
    let f = v.as_struct()?;
    Some(ProceduralNode {
        min: vec3_from_value(f.get("min")?)?,
        max: vec3_from_value(f.get("max")?)?,
        opaque: f.get("opaque")?.as_bool()?,
        geometry_index: f.get("geometry_index")?.as_u32()?,
        primitive_index: f.get("primitive_index")?.as_u32()?,
    })
}

/// A typed runtime value. Every `Value` owns its nested values
/// transitively: dropping one drops its whole subtree exactly once, which
/// Rust's ownership already gives us for free — no manual reference
/// counting is needed for the *owning* case (see [`crate::data`] for the
/// weak-alias case that id-table entries additionally need).
#[derive(Clone, Debug, PartialEq)]
pub struct Value {
    ty: Type,
    data: ValueData,
}

impl Value {
    pub fn type_of(&self) -> &Type {
        &self.ty
    }

    // --- Convenience constructors -----------------------------------
    pub fn from_bool(x: bool) -> Self {
        Value {
            ty: Type::Bool,
            data: ValueData::Primitive(PrimitiveWord::from_bool(x)),
        }
    }
    pub fn from_u32(x: u32) -> Self {
        Value {
            ty: Type::uint32(),
            data: ValueData::Primitive(PrimitiveWord::from_u32(x)),
        }
    }
    pub fn from_i32(x: i32) -> Self {
        Value {
            ty: Type::int32(),
            data: ValueData::Primitive(PrimitiveWord::from_i32(x)),
        }
    }
    pub fn from_f32(x: f32) -> Self {
        Value {
            ty: Type::float32(),
            data: ValueData::Primitive(PrimitiveWord::from_f32(x)),
        }
    }
    pub fn from_string(s: impl Into<String>) -> Self {
        Value {
            ty: Type::String,
            data: ValueData::String(s.into()),
        }
    }
    pub fn array(element_ty: Type, elements: Vec<Value>) -> Self {
        let element_count = Some(elements.len() as u32);
        Value {
            ty: Type::Array(crate::ty::ArrayType {
                element_ty: Box::new(element_ty),
                element_count,
            }),
            data: ValueData::Array(ArrayVal::new(elements)),
        }
    }
    pub fn struct_of(ty: Type, fields: Vec<(String, Value)>) -> Self {
        Value {
            ty,
            data: ValueData::Struct(StructVal::new(fields)),
        }
    }
    pub fn accel_struct(val: AccelStructVal) -> Self {
        Value {
            ty: Type::AccelStruct,
            data: ValueData::AccelStruct(Box::new(val)),
        }
    }

    // --- Accessors ----------------------------------------------------
    pub fn as_bool(&self) -> Option<bool> {
        match &self.data {
            ValueData::Primitive(w) => Some(w.as_bool()),
            _ => None,
        }
    }
    pub fn as_u32(&self) -> Option<u32> {
        match &self.data {
            ValueData::Primitive(w) => Some(w.as_u32()),
            _ => None,
        }
    }
    pub fn as_i32(&self) -> Option<i32> {
        match &self.data {
            ValueData::Primitive(w) => Some(w.as_i32()),
            _ => None,
        }
    }
    pub fn as_f32(&self) -> Option<f32> {
        match &self.data {
            ValueData::Primitive(w) => Some(w.as_f32()),
            _ => None,
        }
    }
    pub fn as_string(&self) -> Option<&str> {
        match &self.data {
            ValueData::String(s) => Some(s.as_str()),
            _ => None,
        }
    }
    pub fn as_array(&self) -> Option<&ArrayVal> {
        match &self.data {
            ValueData::Array(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_array_mut(&mut self) -> Option<&mut ArrayVal> {
        match &mut self.data {
            ValueData::Array(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_struct(&self) -> Option<&StructVal> {
        match &self.data {
            ValueData::Struct(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_struct_mut(&mut self) -> Option<&mut StructVal> {
        match &mut self.data {
            ValueData::Struct(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_coop_matrix(&self) -> Option<&CoopMatrixVal> {
        match &self.data {
            ValueData::CoopMatrix(m) => Some(m),
            _ => None,
        }
    }
    pub fn as_coop_matrix_mut(&mut self) -> Option<&mut CoopMatrixVal> {
        match &mut self.data {
            ValueData::CoopMatrix(m) => Some(m),
            _ => None,
        }
    }
    pub fn as_image(&self) -> Option<&ImageVal> {
        match &self.data {
            ValueData::Image(i) => Some(i),
            _ => None,
        }
    }
    pub fn as_image_mut(&mut self) -> Option<&mut ImageVal> {
        match &mut self.data {
            ValueData::Image(i) => Some(i),
            _ => None,
        }
    }
    pub fn as_sampled_image(&self) -> Option<&SampledImageVal> {
        match &self.data {
            ValueData::SampledImage(si) => Some(si),
            _ => None,
        }
    }
    pub fn as_accel_struct(&self) -> Option<&AccelStructVal> {
        match &self.data {
            ValueData::AccelStruct(a) => Some(a),
            _ => None,
        }
    }
    pub fn as_accel_struct_mut(&mut self) -> Option<&mut AccelStructVal> {
        match &mut self.data {
            ValueData::AccelStruct(a) => Some(a),
            _ => None,
        }
    }

    /// `Type::construct`'s counterpart: allocate a fresh `Value` of `ty`,
    /// either zero-initialised (`undef = false`, matching the null-constant
    /// opcode) or filled with an "undefined sentinel" pattern
    /// (`undef = true`) that is observably non-zero so uninitialised reads
    /// are easy to spot in a debug dump.
    pub fn construct(ty: &Type, undef: bool) -> Value {
        let sentinel_word = if undef { 0xDEAD_BEEF } else { 0 };
        let data = match ty {
            Type::Void => ValueData::Primitive(PrimitiveWord(0)),
            Type::Bool => ValueData::Primitive(PrimitiveWord(if undef { 1 } else { 0 })),
            Type::Uint { .. } | Type::Int { .. } | Type::Float { .. } => {
                ValueData::Primitive(PrimitiveWord(sentinel_word))
            }
            Type::Pointer(_) => ValueData::Primitive(PrimitiveWord(sentinel_word)),
            Type::Array(a) => {
                let n = a.element_count.unwrap_or(0) as usize;
                let elements = (0..n).map(|_| Value::construct(&a.element_ty, undef)).collect();
                ValueData::Array(ArrayVal::new(elements))
            }
            Type::Struct(s) => {
                let fields = s
                    .members
                    .iter()
                    .enumerate()
                    .map(|(i, m)| {
                        let name = m.name.clone().unwrap_or_else(|| i.to_string());
                        (name, Value::construct(&m.ty, undef))
                    })
                    .collect();
                ValueData::Struct(StructVal::new(fields))
            }
            Type::String => ValueData::String(String::new()),
            Type::Image(img) => ValueData::Image(ImageVal::new(
                img.dim,
                img.mipmaps,
                img.comps,
                extent_hint(img.dim),
            )),
            Type::Sampler => ValueData::Sampler(SamplerVal { lod: 0.0 }),
            Type::SampledImage => ValueData::SampledImage(SampledImageVal {
                sampler: SamplerVal { lod: 0.0 },
                image: ImageVal::new(ImageDim::TwoD, 1, ComponentLayout::default(), [1, 1, 1]),
            }),
            Type::CoopMatrix(m) => ValueData::CoopMatrix(CoopMatrixVal::new_unsized(m.rows)),
            Type::AccelStruct => ValueData::AccelStruct(Box::new(AccelStructVal::new(
                NodePool::default(),
                NodeReference {
                    kind: crate::accel::NodeKind::Box,
                    pool_index: 0,
                },
            ))),
            Type::Function(_) => ValueData::Primitive(PrimitiveWord(0)),
        };
        Value {
            ty: ty.clone(),
            data,
        }
    }

    /// Deep overwrite. Requires `other.type_of()` to share this value's
    /// base; fails with `ShapeMismatch` otherwise.
    pub fn copy_from(&mut self, other: &Value, inst_idx: Option<usize>) -> Result<()> {
        if !self.ty.same_base(&other.ty) {
            return Err(InterpError::shape_mismatch(
                inst_idx,
                format!("cannot copy {} into {}", other.ty, self.ty),
            ));
        }
        match (&mut self.data, &other.data) {
            (ValueData::Primitive(dst), ValueData::Primitive(src)) => {
                *dst = *src;
            }
            (ValueData::Array(dst), ValueData::Array(src)) => {
                dst.copy_from(src, inst_idx)?;
                if let Type::Array(a) = &mut self.ty {
                    if a.element_count.is_none() || a.element_count == Some(0) {
                        a.element_count = Some(dst.elements.len() as u32);
                    }
                }
            }
            (ValueData::Struct(dst), ValueData::Struct(src)) => {
                dst.copy_from(src, inst_idx)?;
            }
            (ValueData::CoopMatrix(dst), ValueData::CoopMatrix(src)) => {
                dst.copy_from(src, inst_idx)?;
            }
            (ValueData::String(dst), ValueData::String(src)) => {
                *dst = src.clone();
            }
            (ValueData::Image(dst), ValueData::Image(src)) => {
                *dst = src.clone();
            }
            (ValueData::Sampler(dst), ValueData::Sampler(src)) => {
                *dst = src.clone();
            }
            (ValueData::SampledImage(dst), ValueData::SampledImage(src)) => {
                *dst = src.clone();
            }
            (ValueData::AccelStruct(dst), ValueData::AccelStruct(src)) => {
                *dst = src.clone();
            }
            _ => {
                return Err(InterpError::shape_mismatch(
                    inst_idx,
                    "value categories differ despite matching type base",
                ));
            }
        }
        Ok(())
    }

    /// Bit-level reinterpretation for primitives; elementwise for arrays;
    /// falls back to `copy_from` for everything else.
    pub fn copy_reinterp(&mut self, other: &Value, inst_idx: Option<usize>) -> Result<()> {
        match (&mut self.data, &other.data) {
            (ValueData::Primitive(dst), ValueData::Primitive(src)) => {
                *dst = src.reinterp();
                Ok(())
            }
            (ValueData::Array(dst), ValueData::Array(src)) => {
                if dst.elements.len() != src.elements.len() && !dst.elements.is_empty() {
                    return Err(InterpError::shape_mismatch(
                        inst_idx,
                        "array length mismatch on reinterp copy",
                    ));
                }
                if dst.elements.len() != src.elements.len() {
                    dst.elements = src.elements.clone();
                    return Ok(());
                }
                for (d, s) in dst.elements.iter_mut().zip(src.elements.iter()) {
                    d.copy_reinterp(s, inst_idx)?;
                }
                Ok(())
            }
            _ => self.copy_from(other, inst_idx),
        }
    }

    /// Structural deep equality with float tolerance expressed in
    /// significant figures (see [`primitive::eq_float`]).
    pub fn equals(&self, other: &Value, sig_figs: u32) -> bool {
        if !self.ty.same_base(&other.ty) {
            return false;
        }
        match (&self.data, &other.data) {
            (ValueData::Primitive(a), ValueData::Primitive(b)) => {
                if self.ty.is_float() {
                    primitive::eq_float(a.as_f32(), b.as_f32(), sig_figs)
                } else {
                    a == b
                }
            }
            (ValueData::Array(a), ValueData::Array(b)) => {
                a.elements.len() == b.elements.len()
                    && a.elements
                        .iter()
                        .zip(b.elements.iter())
                        .all(|(x, y)| x.equals(y, sig_figs))
            }
            (ValueData::Struct(a), ValueData::Struct(b)) => {
                a.fields.len() == b.fields.len()
                    && a.fields
                        .iter()
                        .zip(b.fields.iter())
                        .all(|((an, av), (bn, bv))| an == bn && av.equals(bv, sig_figs))
            }
            (ValueData::CoopMatrix(a), ValueData::CoopMatrix(b)) => {
                a.elements.len() == b.elements.len()
                    && a.elements
                        .iter()
                        .zip(b.elements.iter())
                        .all(|(x, y)| x.equals(y, sig_figs))
            }
            (ValueData::String(a), ValueData::String(b)) => a == b,
            (ValueData::Image(a), ValueData::Image(b)) => a == b,
            (ValueData::Sampler(a), ValueData::Sampler(b)) => a == b,
            (ValueData::SampledImage(a), ValueData::SampledImage(b)) => a == b,
            (ValueData::AccelStruct(a), ValueData::AccelStruct(b)) => a == b,
            _ => false,
        }
    }

    /// Post-order traversal: applies `f` to every descendant, then to
    /// `self`. The uniform fold the design notes describe `recursiveApply`
    /// as being, over the closed value sum.
    pub fn recursive_apply(&mut self, f: &mut dyn FnMut(&mut Value)) {
        match &mut self.data {
            ValueData::Array(a) => {
                for e in a.elements.iter_mut() {
                    e.recursive_apply(f);
                }
            }
            ValueData::Struct(s) => {
                for (_, v) in s.fields.iter_mut() {
                    v.recursive_apply(f);
                }
            }
            ValueData::CoopMatrix(m) => {
                for e in m.elements.iter_mut() {
                    e.recursive_apply(f);
                }
            }
            _ => {}
        }
        f(self);
    }

    /// Marks every `CoopMatrix` found while walking this value's tree as
    /// unsized. Used by `Variable::init_value` right after a pointee value
    /// is materialised.
    pub fn mark_coop_matrices_unsized(&mut self) {
        self.recursive_apply(&mut |v| {
            if let ValueData::CoopMatrix(m) = &mut v.data {
                m.unsized_ = true;
            }
        });
    }

    /// Materialises every still-`unsized` `CoopMatrix` found while walking
    /// this value's tree, partitioning `rows*cols` total elements across
    /// `num_invocations` per `CoopMatrixVal::enforce_size`. Called the first
    /// time a value is read during execution (see `read_value` in
    /// `exec::dispatch`), the natural point a cooperative matrix becomes
    /// "accessed" rather than just declared.
    pub fn enforce_coop_matrix_sizes(&mut self, invocation: u32, num_invocations: u32) {
        self.recursive_apply(&mut |v| {
            let sizing = match &v.ty {
                Type::CoopMatrix(m) => Some((m.rows * m.cols, (*m.element_ty).clone())),
                _ => None,
            };
            if let Some((total_elements, element_ty)) = sizing {
                if let ValueData::CoopMatrix(m) = &mut v.data {
                    if m.unsized_ {
                        m.enforce_size(invocation, num_invocations, total_elements, &element_ty);
                    }
                }
            }
        });
    }

    /// Produces the external, language-neutral structured form. Field names
    /// and ordering are fixed per type and form part of the external
    /// interface.
    pub fn to_struct(&self) -> StructVal {
        match &self.data {
            ValueData::Struct(s) => s.clone(),
            ValueData::Image(img) => StructVal::new(vec![
                ("ref".to_string(), Value::from_u32(0)),
                ("dim".to_string(), Value::from_u32(img.dim as u32)),
                ("mipmaps".to_string(), Value::from_u32(img.mipmaps)),
                (
                    "comps".to_string(),
                    Value::array(
                        Type::uint32(),
                        vec![
                            Value::from_u32(img.comps.r),
                            Value::from_u32(img.comps.g),
                            Value::from_u32(img.comps.b),
                            Value::from_u32(img.comps.a),
                        ],
                    ),
                ),
                (
                    "data".to_string(),
                    Value::array(
                        Type::uint32(),
                        img.data
                            .iter()
                            .flat_map(|&texel| img.unpack(texel).elements)
                            .collect(),
                    ),
                ),
            ]),
            ValueData::Sampler(s) => {
                StructVal::new(vec![("lod".to_string(), Value::from_f32(s.lod))])
            }
            ValueData::SampledImage(si) => StructVal::new(vec![
                (
                    "sampler".to_string(),
                    Value {
                        ty: Type::Sampler,
                        data: ValueData::Sampler(si.sampler.clone()),
                    },
                ),
                (
                    "image".to_string(),
                    Value {
                        ty: Type::Image(crate::ty::ImageType {
                            dim: si.image.dim,
                            mipmaps: si.image.mipmaps,
                            comps: si.image.comps,
                        }),
                        data: ValueData::Image(si.image.clone()),
                    },
                ),
            ]),
            ValueData::AccelStruct(accel) => StructVal::new(vec![
                ("tlas".to_string(), node_ref_to_value(accel.tlas)),
                (
                    "box_nodes".to_string(),
                    Value::array(
                        Type::Struct(StructType::default()),
                        accel.pool.box_nodes.iter().map(box_node_to_value).collect(),
                    ),
                ),
                (
                    "instance_nodes".to_string(),
                    Value::array(
                        Type::Struct(StructType::default()),
                        accel.pool.instance_nodes.iter().map(instance_node_to_value).collect(),
                    ),
                ),
                (
                    "triangle_nodes".to_string(),
                    Value::array(
                        Type::Struct(StructType::default()),
                        accel.pool.triangle_nodes.iter().map(triangle_node_to_value).collect(),
                    ),
                ),
                (
                    "procedural_nodes".to_string(),
                    Value::array(
                        Type::Struct(StructType::default()),
                        accel.pool.procedural_nodes.iter().map(procedural_node_to_value).collect(),
                    ),
                ),
            ]),
            ValueData::Array(a) => StructVal::new(
                a.elements
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v.clone()))
                    .collect(),
            ),
            ValueData::CoopMatrix(m) => StructVal::new(
                m.elements
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v.clone()))
                    .collect(),
            ),
            ValueData::Primitive(_) | ValueData::String(_) => {
                StructVal::new(vec![("value".to_string(), self.clone())])
            }
        }
    }

    /// Round-trip counterpart of `to_struct`: overwrites this value from an
    /// abstract structured form previously produced by `to_struct`.
    pub fn copy_from_struct(&mut self, s: &StructVal, inst_idx: Option<usize>) -> Result<()> {
        match &mut self.data {
            ValueData::Struct(dst) => dst.copy_from(s, inst_idx),
            ValueData::Image(img) => {
                if let Some(mipmaps) = s.get("mipmaps").and_then(Value::as_u32) {
                    img.mipmaps = mipmaps;
                }
                if let Some(comps) = s.get("comps").and_then(Value::as_array) {
                    let get = |i: usize| comps.elements.get(i).and_then(Value::as_u32).unwrap_or(0);
                    img.comps = ComponentLayout {
                        r: get(0),
                        g: get(1),
                        b: get(2),
                        a: get(3),
                        count: [get(0), get(1), get(2), get(3)]
                            .iter()
                            .filter(|x| **x != 0)
                            .count() as u32,
                    };
                }
                if let Some(data) = s.get("data").and_then(Value::as_array) {
                    let count = img.comps.count.max(1) as usize;
                    img.data = data
                        .elements
                        .chunks(count)
                        .map(|chunk| img.pack(&ArrayVal::new(chunk.to_vec())))
                        .collect();
                }
                Ok(())
            }
            ValueData::Sampler(smp) => {
                if let Some(lod) = s.get("lod").and_then(Value::as_f32) {
                    smp.lod = lod;
                }
                Ok(())
            }
            ValueData::SampledImage(si) => {
                if let Some(sampler) = s.get("sampler") {
                    if let ValueData::Sampler(sv) = &sampler.data {
                        si.sampler = sv.clone();
                    }
                }
                if let Some(image) = s.get("image") {
                    let mut tmp = Value {
                        ty: Type::Image(crate::ty::ImageType {
                            dim: si.image.dim,
                            mipmaps: si.image.mipmaps,
                            comps: si.image.comps,
                        }),
                        data: ValueData::Image(si.image.clone()),
                    };
                    tmp.copy_from_struct(&image.to_struct(), inst_idx)?;
                    if let ValueData::Image(iv) = tmp.data {
                        si.image = iv;
                    }
                }
                Ok(())
            }
            ValueData::AccelStruct(accel) => {
                if let Some(tlas) = s.get("tlas").and_then(node_ref_from_value) {
                    accel.tlas = tlas;
                }
                if let Some(nodes) = s.get("box_nodes").and_then(Value::as_array) {
                    accel.pool.box_nodes =
                        nodes.elements.iter().filter_map(box_node_from_value).collect();
                }
                if let Some(nodes) = s.get("instance_nodes").and_then(Value::as_array) {
                    accel.pool.instance_nodes =
                        nodes.elements.iter().filter_map(instance_node_from_value).collect();
                }
                if let Some(nodes) = s.get("triangle_nodes").and_then(Value::as_array) {
                    accel.pool.triangle_nodes =
                        nodes.elements.iter().filter_map(triangle_node_from_value).collect();
                }
                if let Some(nodes) = s.get("procedural_nodes").and_then(Value::as_array) {
                    accel.pool.procedural_nodes =
                        nodes.elements.iter().filter_map(procedural_node_from_value).collect();
                }
                accel.trace = Trace::new(&accel.pool, accel.tlas, RayFlags::NONE);
                Ok(())
            }
            _ => Err(InterpError::unsupported(
                inst_idx,
                format!("{} has no struct codec", self.ty),
            )),
        }
    }

    /// Guards against the 64-bit-primitive passthrough path the type
    /// descriptor section calls out: warns once and truncates.
    pub fn from_wide_primitive(ty: Type, bits: u64, warn: &dyn WarnSink) -> Value {
        Value {
            ty,
            data: ValueData::Primitive(PrimitiveWord::from_wide(bits, warn)),
        }
    }
}

fn extent_hint(dim: ImageDim) -> [u32; 3] {
    match dim {
        ImageDim::OneD => [1, 1, 1],
        ImageDim::TwoD => [1, 1, 1],
        ImageDim::ThreeD => [1, 1, 1],
        ImageDim::Cube => [1, 1, 6],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_reinterp_preserves_bit_pattern() {
        let f = Value::from_f32(1.0);
        let mut u = Value::from_u32(0);
        u.copy_reinterp(&f, None).unwrap();
        assert_eq!(u.as_u32().unwrap(), 0x3F800000);
    }

    #[test]
    fn round_trip_invariant_holds_for_primitives() {
        let v = Value::from_f32(2.5);
        let v2 = Value::construct(v.type_of(), false);
        let mut v2 = v2;
        v2.copy_from(&v, None).unwrap();
        assert!(v.equals(&v2, 6));
    }

    #[test]
    fn struct_round_trip_through_to_struct() {
        use crate::ty::{ComponentLayout, ImageDim};
        let comps = ComponentLayout {
            r: 1,
            g: 2,
            b: 3,
            a: 0,
            count: 3,
        };
        let mut img = Value {
            ty: Type::Image(crate::ty::ImageType {
                dim: ImageDim::TwoD,
                mipmaps: 1,
                comps,
            }),
            data: ValueData::Image(ImageVal::new(ImageDim::TwoD, 1, comps, [2, 2, 1])),
        };
        if let ValueData::Image(i) = &mut img.data {
            i.data = vec![
                u32::from_le_bytes([255, 0, 0, 0]),
                u32::from_le_bytes([0, 255, 0, 0]),
                u32::from_le_bytes([0, 0, 255, 0]),
                u32::from_le_bytes([255, 255, 255, 0]),
            ];
        }
        let s = img.to_struct();
        let mut img2 = Value::construct(img.type_of(), false);
        img2.copy_from_struct(&s, None).unwrap();
        assert!(img.equals(&img2, 6));
    }

    #[test]
    fn image_to_struct_flattens_data_into_one_entry_per_channel() {
        use crate::ty::{ComponentLayout, ImageDim};
        let comps = ComponentLayout {
            r: 1,
            g: 2,
            b: 3,
            a: 0,
            count: 3,
        };
        let mut img = Value {
            ty: Type::Image(crate::ty::ImageType {
                dim: ImageDim::TwoD,
                mipmaps: 1,
                comps,
            }),
            data: ValueData::Image(ImageVal::new(ImageDim::TwoD, 1, comps, [2, 2, 1])),
        };
        if let ValueData::Image(i) = &mut img.data {
            i.data = vec![
                u32::from_le_bytes([255, 0, 0, 0]),
                u32::from_le_bytes([0, 255, 0, 0]),
                u32::from_le_bytes([0, 0, 255, 0]),
                u32::from_le_bytes([255, 255, 255, 0]),
            ];
        }
        let s = img.to_struct();
        let data = s.get("data").and_then(Value::as_array).unwrap();
        let flat: Vec<u32> = data.elements.iter().map(|v| v.as_u32().unwrap()).collect();
        assert_eq!(
            flat,
            vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255]
        );
    }

    #[test]
    fn accel_struct_round_trips_through_to_struct() {
        let mut pool = NodePool::default();
        pool.triangle_nodes.push(TriangleNode {
            vertices: [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            opaque: true,
            geometry_index: 0,
            primitive_index: 0,
        });
        let tlas = NodeReference {
            kind: NodeKind::Triangle,
            pool_index: 0,
        };
        let accel = Value::accel_struct(AccelStructVal::new(pool, tlas));
        let s = accel.to_struct();
        let mut accel2 = Value::construct(accel.type_of(), false);
        accel2.copy_from_struct(&s, None).unwrap();
        assert_eq!(accel, accel2);
    }
}
