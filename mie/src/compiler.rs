//! The `mie` compiler (spec.md §4.6): turns tokenized source into a
//! `vmie` program, maintaining a word table, a pending-skip-jump list for
//! in-line word definitions, and sew scopes for metaprogramming.

use crate::error::{Error, Location};
use crate::numbers::{parse_number, Number};
use crate::tokenizer::{Token, Tokenizer};
use model::ColorChar;
use std::collections::HashMap;
use vmie::Op;

const MAX_SEW_DEPTH: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    Colon,
    ColonAddr,
    Semicolon,
    Comptime,
    EnterSew,
    LeaveSew,
    Op(Op),
}

fn lookup_builtin(word: &str) -> Option<Builtin> {
    Some(match word {
        ":" => Builtin::Colon,
        ":&" => Builtin::ColonAddr,
        ";" => Builtin::Semicolon,
        "comptime" => Builtin::Comptime,
        "<#" => Builtin::EnterSew,
        "#>" => Builtin::LeaveSew,

        "NOP" => Builtin::Op(Op::Nop),
        "halt" => Builtin::Op(Op::Halt),
        "return" => Builtin::Op(Op::Return),
        "drop" => Builtin::Op(Op::Drop),
        "PICK" => Builtin::Op(Op::Pick),
        "ROTATE" => Builtin::Op(Op::Rotate),
        "=" => Builtin::Op(Op::Eq),
        "typeof" => Builtin::Op(Op::Typeof),
        "CAST" => Builtin::Op(Op::Cast),
        "here" => Builtin::Op(Op::Here),
        "JMPI" => Builtin::Op(Op::Jmpi),
        "JSRI" => Builtin::Op(Op::Jsri),
        "I>R" => Builtin::Op(Op::I2r),
        "R>I" => Builtin::Op(Op::R2i),
        "F>I" => Builtin::Op(Op::F2i),
        "I>F" => Builtin::Op(Op::I2f),
        "SET-GLOBAL" => Builtin::Op(Op::SetGlobal),
        "GET-GLOBAL" => Builtin::Op(Op::GetGlobal),

        "F+" => Builtin::Op(Op::Fadd),
        "F~" => Builtin::Op(Op::Fneg),
        "F*" => Builtin::Op(Op::Fmul),
        "F%" => Builtin::Op(Op::Fmod),
        "F1/" => Builtin::Op(Op::Finv),
        "F/" => Builtin::Op(Op::Fdiv),
        "F<" => Builtin::Op(Op::Flt),
        "F<=" => Builtin::Op(Op::Fle),
        "F!=" => Builtin::Op(Op::Fne),
        "F=" => Builtin::Op(Op::Feq),
        "F>=" => Builtin::Op(Op::Fge),
        "F>" => Builtin::Op(Op::Fgt),

        "I+" => Builtin::Op(Op::Iadd),
        "I~" => Builtin::Op(Op::Ineg),
        "I*" => Builtin::Op(Op::Imul),
        "I/" => Builtin::Op(Op::Idiv),
        "I%" => Builtin::Op(Op::Imod),
        "I&" => Builtin::Op(Op::Iband),
        "I|" => Builtin::Op(Op::Ibor),
        "I^" => Builtin::Op(Op::Ibxor),
        "I!" => Builtin::Op(Op::Ibnot),
        "I&&" => Builtin::Op(Op::Iland),
        "I||" => Builtin::Op(Op::Ilor),
        "I^^" => Builtin::Op(Op::Ilxor),
        "I!!" => Builtin::Op(Op::Ilnot),
        "I<<" => Builtin::Op(Op::Ilshift),
        "I>>" => Builtin::Op(Op::Irshift),
        "I<" => Builtin::Op(Op::Ilt),
        "I<=" => Builtin::Op(Op::Ile),
        "I=" => Builtin::Op(Op::Ieq),
        "I!=" => Builtin::Op(Op::Ine),
        "I>=" => Builtin::Op(Op::Ige),
        "I>" => Builtin::Op(Op::Igt),

        "arrnew" => Builtin::Op(Op::Arrnew),
        "arrlen" => Builtin::Op(Op::Arrlen),
        "ARRGET" => Builtin::Op(Op::Arrget),
        "arrput" => Builtin::Op(Op::Arrput),
        "arrpop" => Builtin::Op(Op::Arrpop),
        "ARRSET" => Builtin::Op(Op::Arrset),
        "arrjoin" => Builtin::Op(Op::Arrjoin),
        "ARRSPLIT" => Builtin::Op(Op::Arrsplit),

        "mapnew" => Builtin::Op(Op::Mapnew),
        "maphas" => Builtin::Op(Op::Maphas),
        "mapget" => Builtin::Op(Op::Mapget),
        "mapset" => Builtin::Op(Op::Mapset),
        "mapdel" => Builtin::Op(Op::Mapdel),

        "there" => Builtin::Op(Op::There),
        "navigate" => Builtin::Op(Op::Navigate),
        "SEW" => Builtin::Op(Op::Sew),
        "SEW-JMP" => Builtin::Op(Op::SewJmp),
        "SEW-JMP0" => Builtin::Op(Op::SewJmp0),
        "SEW-JSR" => Builtin::Op(Op::SewJsr),
        "SEW-ADDR" => Builtin::Op(Op::SewAddr),
        "SEW-LIT" => Builtin::Op(Op::SewLit),
        "SEW-COLON" => Builtin::Op(Op::SewColon),
        "SEW-SEMICOLON" => Builtin::Op(Op::SewSemicolon),

        _ => return None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColonKind {
    None,
    Direct,
    Addr,
}

#[derive(Debug, Clone, Copy)]
struct WordInfo {
    is_comptime: bool,
    is_direct: bool,
    is_addr: bool,
    is_sealed: bool,
    addr: i32,
}

pub struct Compiler {
    vm: vmie::Vm,
    word_lut: HashMap<String, WordInfo>,
    def_stack: Vec<String>,
    skip_patch_stack: Vec<usize>,
    sew_depth: u32,
    colon: ColonKind,
    prefix_comptime: bool,
    location: Location,
    tokenizer: Tokenizer,
}

impl Compiler {
    pub fn new() -> Self {
        Self {
            vm: vmie::Vm::new(Vec::new(), 0),
            word_lut: HashMap::new(),
            def_stack: Vec::new(),
            skip_patch_stack: Vec::new(),
            sew_depth: 0,
            colon: ColonKind::None,
            prefix_comptime: false,
            location: Location::default(),
            tokenizer: Tokenizer::new(),
        }
    }

    /// Feeds one colored source character through the tokenizer,
    /// compiling a word the moment it settles.
    pub fn push_char(&mut self, ch: ColorChar) -> Result<(), Error> {
        if let Some(token) = self.tokenizer.push(ch) {
            self.compile_token(token)?;
        }
        Ok(())
    }

    /// Compiles a whole source string with a neutral color, for tests
    /// and tooling that don't carry per-character color.
    pub fn compile_str(&mut self, src: &str) -> Result<(), Error> {
        for c in src.chars() {
            self.push_char(ColorChar::new(c, model::Splash4::default()))?;
        }
        self.finish()
    }

    /// Flushes any trailing token and checks for unterminated scopes.
    pub fn finish(&mut self) -> Result<(), Error> {
        let tokenizer = std::mem::replace(&mut self.tokenizer, Tokenizer::new());
        let balanced = tokenizer.is_balanced();
        if let Some(token) = tokenizer.finish() {
            self.compile_token(token)?;
        }
        if !balanced {
            return Err(self.error("unterminated comment or string".to_string()));
        }
        if self.colon != ColonKind::None {
            return Err(self.error("end of input while expecting a word name after ':'".to_string()));
        }
        if !self.def_stack.is_empty() {
            return Err(self.error("end of input while expecting ';'".to_string()));
        }
        Ok(())
    }

    /// Consumes the compiler and returns the finished program words.
    pub fn into_program(self) -> Vec<i32> {
        self.vm.program
    }

    pub fn program(&self) -> &[i32] {
        &self.vm.program
    }

    pub fn lookup_word(&self, name: &str) -> Option<i32> {
        self.word_lut.get(name).map(|info| info.addr)
    }

    fn error(&self, message: String) -> Error {
        Error {
            message,
            line: self.location.line,
            column: self.location.column,
        }
    }

    fn compile_token(&mut self, token: Token) -> Result<(), Error> {
        self.location = token.location;
        let word = token.text;

        if self.colon != ColonKind::None {
            return self.compile_colon_name(&word);
        }

        if let Some(bw) = lookup_builtin(&word) {
            return self.compile_builtin(bw);
        }

        if let Some(number) = parse_number(&word) {
            return self.compile_number(number);
        }

        if let Some(info) = self.word_lut.get(&word).copied() {
            return self.compile_user_word(info);
        }

        Err(self.error(format!("undefined word [{word}]")))
    }

    fn compile_colon_name(&mut self, word: &str) -> Result<(), Error> {
        if lookup_builtin(word).is_some() {
            return Err(self.error(format!("cannot redefine built-in word ({word})")));
        }
        if parse_number(word).is_some() {
            return Err(self.error(format!("cannot define a number ({word})")));
        }
        if self.word_lut.contains_key(word) {
            return Err(self.error(format!("cannot redefine previously defined word ({word})")));
        }
        let info = WordInfo {
            is_comptime: self.prefix_comptime,
            is_direct: self.colon == ColonKind::Direct,
            is_addr: self.colon == ColonKind::Addr,
            is_sealed: false,
            addr: self.vm.sew_cursor as i32,
        };
        self.word_lut.insert(word.to_string(), info);
        self.def_stack.push(word.to_string());
        self.colon = ColonKind::None;
        self.prefix_comptime = false;
        Ok(())
    }

    fn compile_builtin(&mut self, bw: Builtin) -> Result<(), Error> {
        match bw {
            Builtin::Colon | Builtin::ColonAddr => {
                if self.sew_depth > 0 {
                    return Err(self.error("colon not allowed in <#...#>".to_string()));
                }
                self.colon = if bw == Builtin::Colon {
                    ColonKind::Direct
                } else {
                    ColonKind::Addr
                };
                self.push_word(Op::Jmp.to_i32());
                let placeholder_addr = self.vm.sew_cursor;
                self.push_word(-1);
                self.skip_patch_stack.push(placeholder_addr);
                Ok(())
            }
            Builtin::Semicolon => {
                if self.sew_depth > 0 {
                    return Err(self.error("semicolon not allowed in <#...#>".to_string()));
                }
                if self.prefix_comptime {
                    return Err(self.error("nonsensical comptime'd semicolon".to_string()));
                }
                let name = self
                    .def_stack
                    .pop()
                    .ok_or_else(|| self.error("too many semicolons".to_string()))?;
                self.push_word(Op::Return.to_i32());
                let write_addr = self.vm.sew_cursor as i32;
                let skip_addr = self
                    .skip_patch_stack
                    .pop()
                    .expect("def_stack and skip_patch_stack track in lockstep");
                self.vm.program[skip_addr] = write_addr;
                self.word_lut.get_mut(&name).expect("just defined").is_sealed = true;
                Ok(())
            }
            Builtin::Comptime => {
                if self.sew_depth > 0 {
                    return Err(self.error("comptime not allowed in <#...#>".to_string()));
                }
                self.prefix_comptime = true;
                Ok(())
            }
            Builtin::EnterSew => {
                self.sew_depth += 1;
                if self.sew_depth > MAX_SEW_DEPTH {
                    return Err(self.error(format!(
                        "sew depth exceeded maximum of {MAX_SEW_DEPTH}"
                    )));
                }
                Ok(())
            }
            Builtin::LeaveSew => {
                if self.sew_depth == 0 {
                    return Err(self.error("too many `#>`s".to_string()));
                }
                self.sew_depth -= 1;
                Ok(())
            }
            Builtin::Op(op) => {
                if self.prefix_comptime {
                    return Err(self.error(
                        "comptime only supported immediately before a word definition".to_string(),
                    ));
                }
                self.push_word(op.to_i32());
                Ok(())
            }
        }
    }

    fn compile_number(&mut self, number: Number) -> Result<(), Error> {
        if self.prefix_comptime {
            return Err(self.error(
                "comptime only supported immediately before a word definition".to_string(),
            ));
        }
        match number {
            Number::Int(v) => {
                self.push_word(Op::IntLiteral.to_i32());
                self.push_word(v);
            }
            Number::Float(v) => {
                self.push_word(Op::FloatLiteral.to_i32());
                self.push_float(v);
            }
        }
        Ok(())
    }

    fn compile_user_word(&mut self, info: WordInfo) -> Result<(), Error> {
        if info.is_comptime {
            let loc = self.location;
            self.vm.call(info.addr).map_err(|err| Error {
                message: format!("comptime error: {err}"),
                line: loc.line,
                column: loc.column,
            })?;
            self.prefix_comptime = false;
            return Ok(());
        }
        if self.prefix_comptime {
            return Err(self.error(
                "comptime only supported immediately before a word definition".to_string(),
            ));
        }
        if info.is_direct {
            self.push_word(Op::Jsr.to_i32());
            self.push_word(info.addr);
        } else {
            debug_assert!(info.is_addr);
            self.push_word(Op::IntLiteral.to_i32());
            self.push_word(info.addr);
        }
        Ok(())
    }

    /// Writes a raw 32-bit word, applying sew-depth literal lifting
    /// (spec.md §4.6): at depth 0 it's a plain append/overwrite at the
    /// cursor; at depth *d*>0 it expands into code that, when run, sews
    /// the word one depth shallower.
    fn push_word(&mut self, value: i32) {
        self.push_word_at_depth(self.sew_depth, value);
    }

    fn push_word_at_depth(&mut self, depth: u32, value: i32) {
        if depth == 0 {
            self.vm.sew_write(value);
        } else {
            let d2 = depth - 1;
            self.push_word_at_depth(d2, Op::IntLiteral.to_i32());
            self.push_word_at_depth(d2, value);
            self.push_word_at_depth(d2, Op::Sew.to_i32());
        }
    }

    fn push_float(&mut self, value: f32) {
        self.push_float_at_depth(self.sew_depth, value);
    }

    fn push_float_at_depth(&mut self, depth: u32, value: f32) {
        if depth == 0 {
            self.vm.sew_write(value.to_bits() as i32);
        } else {
            let d2 = depth - 1;
            self.push_word_at_depth(d2, Op::FloatLiteral.to_i32());
            self.push_float_at_depth(d2, value);
            self.push_word_at_depth(d2, Op::Sew.to_i32());
        }
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vmie::Value;

    fn run(src: &str) -> vmie::Vm {
        let mut cm = Compiler::new();
        cm.compile_str(src).unwrap();
        let mut vm = vmie::Vm::new(cm.into_program(), 0);
        vm.run().unwrap();
        vm
    }

    #[test]
    fn compiles_int_literal_and_add() {
        let vm = run("2 3i I+");
        assert_eq!(vm.stack(), &[Value::int(5)]);
    }

    #[test]
    fn defines_and_calls_a_word() {
        let vm = run(": double 2i I* ; 21 double");
        assert_eq!(vm.stack(), &[Value::int(42)]);
    }

    #[test]
    fn colonaddr_pushes_address_instead_of_calling() {
        let mut cm = Compiler::new();
        cm.compile_str(":& marker halt ; marker").unwrap();
        let addr = cm.lookup_word("marker").unwrap();
        let mut vm = vmie::Vm::new(cm.into_program(), 0);
        vm.run().unwrap();
        assert_eq!(vm.stack(), &[Value::int(addr)]);
    }

    #[test]
    fn redefining_a_word_is_an_error() {
        let mut cm = Compiler::new();
        let err = cm.compile_str(": x 1i ; : x 2i ;").unwrap_err();
        assert!(err.message.contains("cannot redefine"));
    }

    #[test]
    fn undefined_word_is_located() {
        let mut cm = Compiler::new();
        let err = cm.compile_str("1i bogus-word").unwrap_err();
        assert!(err.message.contains("undefined word"));
        assert_eq!(err.line, 1);
    }

    #[test]
    fn unmatched_semicolon_is_an_error() {
        let mut cm = Compiler::new();
        assert!(cm.compile_str(";").is_err());
    }

    #[test]
    fn nested_word_definitions_reseal_correctly() {
        let vm = run(": outer : inner 1i ; inner 2i I+ ; outer");
        assert_eq!(vm.stack(), &[Value::int(3)]);
    }

    #[test]
    fn comptime_word_runs_during_compilation() {
        // `there` pushes the current sew cursor; a comptime word that
        // sews a literal of that address proves it ran at compile time,
        // not at program run time (there's no JSR to it in the output).
        let mut cm = Compiler::new();
        cm.compile_str("comptime : emit-marker there SEW-LIT ;").unwrap();
        let before = cm.program().len();
        cm.compile_str("emit-marker").unwrap();
        let after = cm.program().len();
        // running the comptime word sewed exactly one literal (2 words:
        // opcode + payload) directly into the top-level stream.
        assert_eq!(after - before, 2);
        let mut vm = vmie::Vm::new(cm.into_program(), before as i32);
        vm.run().unwrap();
        assert_eq!(vm.stack(), &[Value::int(before as i32)]);
    }

    #[test]
    fn pick_and_fmul_from_a_literal_word_reference() {
        let vm = run(": fsqr 0i PICK F* ; 42.0 fsqr");
        assert_eq!(vm.stack(), &[Value::float(1764.0)]);
    }

    #[test]
    fn sew_depth_lifts_literals() {
        let mut cm = Compiler::new();
        cm.compile_str("<# 5i #>").unwrap();
        // depth-1 lifting of a single int literal expands to 3 words:
        // INT_LITERAL(OP_INT_LITERAL), INT_LITERAL(5), INT_LITERAL(OP_SEW)
        // each themselves 1-word opcodes plus their payload, so 6 words.
        assert_eq!(cm.program().len(), 6);
    }
}
