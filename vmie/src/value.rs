/// The tag half of a [`Value`] (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Nil,
    Int,
    Float,
    Str,
    Arr,
    Map,
    I32Arr,
    F32Arr,
    Mie,
}

impl Type {
    pub fn from_i32(v: i32) -> Option<Type> {
        Some(match v {
            0 => Type::Nil,
            1 => Type::Int,
            2 => Type::Float,
            3 => Type::Str,
            4 => Type::Arr,
            5 => Type::Map,
            6 => Type::I32Arr,
            7 => Type::F32Arr,
            8 => Type::Mie,
            _ => return None,
        })
    }

    pub fn to_i32(self) -> i32 {
        match self {
            Type::Nil => 0,
            Type::Int => 1,
            Type::Float => 2,
            Type::Str => 3,
            Type::Arr => 4,
            Type::Map => 5,
            Type::I32Arr => 6,
            Type::F32Arr => 7,
            Type::Mie => 8,
        }
    }
}

/// The payload half of a [`Value`]. A real C union in the original; an
/// enum here since Rust has no bitwise-reinterpreting union that's safe
/// to pattern-match, and every op that needs the bitwise reinterpretation
/// ("bitwise cast") does so explicitly via [`Value::as_i32_bits`]/
/// [`Value::as_f32_bits`] rather than relying on the enum's repr.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    I(i32),
    F(f32),
}

/// A tagged value: `(type, payload)`, exactly as spec.md §4.7 describes.
/// Array/map/i32arr/f32arr/mie values carry a handle (an index into the
/// VM's value store) in the `I` payload variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Value {
    pub ty: Type,
    pub payload: Payload,
}

impl Value {
    pub fn nil() -> Self {
        Self {
            ty: Type::Nil,
            payload: Payload::I(0),
        }
    }

    pub fn int(i: i32) -> Self {
        Self {
            ty: Type::Int,
            payload: Payload::I(i),
        }
    }

    pub fn float(f: f32) -> Self {
        Self {
            ty: Type::Float,
            payload: Payload::F(f),
        }
    }

    pub fn handle(ty: Type, handle: i32) -> Self {
        Self {
            ty,
            payload: Payload::I(handle),
        }
    }

    /// Reinterprets the payload bits as `i32`, regardless of tag — what
    /// the `I+`/`I*`/etc. ops do (spec.md: "bitwise-cast operations that
    /// do not check tags").
    pub fn as_i32_bits(self) -> i32 {
        match self.payload {
            Payload::I(i) => i,
            Payload::F(f) => f.to_bits() as i32,
        }
    }

    /// Reinterprets the payload bits as `f32`, regardless of tag — what
    /// the `F+`/`F*`/etc. ops do.
    pub fn as_f32_bits(self) -> f32 {
        match self.payload {
            Payload::F(f) => f,
            Payload::I(i) => f32::from_bits(i as u32),
        }
    }

    /// Typed (tag-checked) conversion to `i32`, used by indexed ops like
    /// `PICK`/`ARRGET` that take an index argument.
    pub fn as_index(self) -> i32 {
        match (self.ty, self.payload) {
            (Type::Int, Payload::I(i)) => i,
            (Type::Float, Payload::F(f)) => f.round() as i32,
            _ => self.as_i32_bits(),
        }
    }
}
