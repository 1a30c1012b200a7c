//! VM opcodes (spec.md §4.7). Most encode as a single 32-bit word; the
//! five "deferred operand" ops read a second word as their argument.

macro_rules! op_enum {
    ($($name:ident = $value:expr),* $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(i32)]
        pub enum Op {
            $($name = $value),*
        }

        impl Op {
            pub fn from_i32(v: i32) -> Option<Op> {
                match v {
                    $($value => Some(Op::$name),)*
                    _ => None,
                }
            }

            pub fn to_i32(self) -> i32 {
                self as i32
            }
        }
    };
}

op_enum! {
    Nop = 0,
    Halt = 1,
    Return = 2,
    Drop = 3,
    Pick = 4,
    Rotate = 5,
    Eq = 6,
    Typeof = 7,
    Cast = 8,
    Here = 9,
    Jmpi = 10,
    Jsri = 11,
    I2r = 12,
    R2i = 13,
    F2i = 14,
    I2f = 15,
    SetGlobal = 16,
    GetGlobal = 17,

    Fadd = 18,
    Fneg = 19,
    Fmul = 20,
    Fmod = 21,
    Finv = 22,
    Fdiv = 23,
    Flt = 24,
    Fle = 25,
    Fne = 26,
    Feq = 27,
    Fge = 28,
    Fgt = 29,

    Iadd = 30,
    Ineg = 31,
    Imul = 32,
    Idiv = 33,
    Imod = 34,
    Iband = 35,
    Ibor = 36,
    Ibxor = 37,
    Ibnot = 38,
    Iland = 39,
    Ilor = 40,
    Ilxor = 41,
    Ilnot = 42,
    Ilshift = 43,
    Irshift = 44,
    Ilt = 45,
    Ile = 46,
    Ieq = 47,
    Ine = 48,
    Ige = 49,
    Igt = 50,

    Arrnew = 51,
    Arrlen = 52,
    Arrget = 53,
    Arrput = 54,
    Arrpop = 55,
    Arrset = 56,
    Arrjoin = 57,
    Arrsplit = 58,

    Mapnew = 59,
    Maphas = 60,
    Mapget = 61,
    Mapset = 62,
    Mapdel = 63,

    There = 64,
    Navigate = 65,
    Sew = 66,
    SewJmp = 67,
    SewJmp0 = 68,
    SewJsr = 69,
    SewAddr = 70,
    SewLit = 71,
    SewColon = 72,
    SewSemicolon = 73,

    IntLiteral = 74,
    FloatLiteral = 75,
    Jmp = 76,
    Jmp0 = 77,
    Jsr = 78,
}

impl Op {
    /// Whether this op reads a second program word as its operand.
    pub fn has_operand(self) -> bool {
        matches!(
            self,
            Op::IntLiteral | Op::FloatLiteral | Op::Jmp | Op::Jmp0 | Op::Jsr
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_i32() {
        for op in [Op::Nop, Op::Iadd, Op::Jsr, Op::SewSemicolon] {
            assert_eq!(Op::from_i32(op.to_i32()), Some(op));
        }
    }

    #[test]
    fn unknown_word_is_none() {
        assert_eq!(Op::from_i32(9999), None);
    }
}
