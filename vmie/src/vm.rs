//! The stack machine itself (spec.md §4.7): a value stack, a separate
//! return stack, globals, and handle-indexed arrays/maps. Programs are
//! flat `Vec<i32>` word streams; [`Op::has_operand`] ops consume a
//! second word.

use crate::opcode::Op;
use crate::value::{Payload, Type, Value};
use crate::Error;

type Result<T> = std::result::Result<T, Error>;

#[derive(Default)]
struct ValueStore {
    arrays: Vec<Vec<Value>>,
    maps: Vec<Vec<(Value, Value)>>,
}

impl ValueStore {
    fn new_array(&mut self) -> i32 {
        self.arrays.push(Vec::new());
        (self.arrays.len() - 1) as i32
    }

    fn new_map(&mut self) -> i32 {
        self.maps.push(Vec::new());
        (self.maps.len() - 1) as i32
    }

    fn array(&self, handle: i32) -> Result<&Vec<Value>> {
        self.arrays
            .get(handle as usize)
            .ok_or(Error::IndexOutOfBounds {
                index: handle,
                len: self.arrays.len(),
            })
    }

    fn array_mut(&mut self, handle: i32) -> Result<&mut Vec<Value>> {
        let len = self.arrays.len();
        self.arrays
            .get_mut(handle as usize)
            .ok_or(Error::IndexOutOfBounds { index: handle, len })
    }

    fn map_mut(&mut self, handle: i32) -> Result<&mut Vec<(Value, Value)>> {
        let len = self.maps.len();
        self.maps
            .get_mut(handle as usize)
            .ok_or(Error::IndexOutOfBounds { index: handle, len })
    }
}

fn values_equal(a: Value, b: Value) -> bool {
    a.ty == b.ty && a.as_i32_bits() == b.as_i32_bits()
}

/// Program execution halts either on `HALT`/an implicit fall-off-the-end,
/// or on the first error, matching spec.md §4.7's "execution halts, error
/// becomes readable" semantics.
pub struct Vm {
    pub program: Vec<i32>,
    pub pc: i32,
    /// Cursor the `SEW*`/`HERE`/`THERE`/`NAVIGATE` family reads and
    /// advances — the compiler's program-buffer write cursor, visible to
    /// comptime code as described in spec.md §4.6.
    pub sew_cursor: usize,
    stack: Vec<Value>,
    rstack: Vec<i32>,
    globals: Vec<Value>,
    vals: ValueStore,
}

impl Vm {
    pub fn new(program: Vec<i32>, entrypoint: i32) -> Self {
        let sew_cursor = program.len();
        Self {
            program,
            pc: entrypoint,
            sew_cursor,
            stack: Vec::new(),
            rstack: Vec::new(),
            globals: Vec::new(),
            vals: ValueStore::default(),
        }
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    fn pop(&mut self) -> Result<Value> {
        self.stack.pop().ok_or(Error::StackUnderflow {
            needed: 1,
            had: 0,
        })
    }

    fn pop_i(&mut self) -> Result<i32> {
        Ok(self.pop()?.as_i32_bits())
    }

    fn pop_f(&mut self) -> Result<f32> {
        Ok(self.pop()?.as_f32_bits())
    }

    fn read_word(&mut self) -> Result<i32> {
        let word = *self
            .program
            .get(self.pc as usize)
            .ok_or(Error::PcOutOfBounds(self.pc))?;
        self.pc += 1;
        Ok(word)
    }

    /// Runs until `HALT`, falling off the program, or an error.
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.step() {
                Ok(true) => continue,
                Ok(false) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Executes one instruction. Returns `Ok(false)` on a clean halt
    /// (HALT, or PC past the end of the program).
    pub fn step(&mut self) -> Result<bool> {
        if self.pc as usize >= self.program.len() {
            return Ok(false);
        }
        let word = self.read_word()?;
        let op = Op::from_i32(word).ok_or(Error::UnknownOpcode(word))?;
        self.exec(op)
    }

    fn exec(&mut self, op: Op) -> Result<bool> {
        use Op::*;
        match op {
            Nop => {}
            Halt => return Err(Error::Halted),
            Return => {
                let addr = self.rstack.pop().ok_or(Error::ReturnStackUnderflow)?;
                self.pc = addr;
            }
            Drop => {
                self.pop()?;
            }
            Pick => {
                let n = self.pop_i()?;
                let idx = self.stack.len() as i32 - 1 - n;
                let v = *self
                    .stack
                    .get(idx as usize)
                    .ok_or(Error::IndexOutOfBounds {
                        index: n,
                        len: self.stack.len(),
                    })?;
                self.push(v);
            }
            Rotate => {
                let d = self.pop_i()?;
                let n = self.pop_i()? as usize;
                if n > self.stack.len() {
                    return Err(Error::IndexOutOfBounds {
                        index: n as i32,
                        len: self.stack.len(),
                    });
                }
                let start = self.stack.len() - n;
                let slice = &mut self.stack[start..];
                let shift = d.rem_euclid(n.max(1) as i32) as usize;
                slice.rotate_right(shift);
            }
            Eq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::int(values_equal(a, b) as i32));
            }
            Typeof => {
                let a = self.pop()?;
                self.push(Value::int(a.ty.to_i32()));
            }
            Cast => {
                let t = self.pop_i()?;
                let a = self.pop()?;
                let ty = Type::from_i32(t).ok_or(Error::UnknownGlobal(t))?;
                self.push(Value { ty, payload: a.payload });
            }
            Here => self.rstack.push(self.pc),
            Jmpi => {
                let addr = self.pop_i()?;
                self.pc = addr;
            }
            Jsri => {
                let addr = self.pop_i()?;
                self.rstack.push(self.pc);
                self.pc = addr;
            }
            I2r => {
                let v = self.pop_i()?;
                self.rstack.push(v);
            }
            R2i => {
                let v = self.rstack.pop().ok_or(Error::ReturnStackUnderflow)?;
                self.push(Value::int(v));
            }
            F2i => {
                let f = self.pop_f()?;
                self.push(Value::int(f as i32));
            }
            I2f => {
                let i = self.pop_i()?;
                self.push(Value::float(i as f32));
            }
            SetGlobal => {
                let idx = self.pop_i()? as usize;
                let v = self.pop()?;
                if idx >= self.globals.len() {
                    self.globals.resize(idx + 1, Value::nil());
                }
                self.globals[idx] = v;
            }
            GetGlobal => {
                let idx = self.pop_i()?;
                let v = *self
                    .globals
                    .get(idx as usize)
                    .ok_or(Error::UnknownGlobal(idx))?;
                self.push(v);
            }

            Fadd => self.binop_f(|a, b| a + b)?,
            Fneg => {
                let a = self.pop_f()?;
                self.push(Value::float(-a));
            }
            Fmul => self.binop_f(|a, b| a * b)?,
            Fmod => self.binop_f(|a, b| a % b)?,
            Finv => {
                let a = self.pop_f()?;
                self.push(Value::float(1.0 / a));
            }
            Fdiv => self.binop_f(|a, b| a / b)?,
            Flt => self.cmp_f(|a, b| a < b)?,
            Fle => self.cmp_f(|a, b| a <= b)?,
            Fne => self.cmp_f(|a, b| a != b)?,
            Feq => self.cmp_f(|a, b| a == b)?,
            Fge => self.cmp_f(|a, b| a >= b)?,
            Fgt => self.cmp_f(|a, b| a > b)?,

            Iadd => self.binop_i(|a, b| Ok(a.wrapping_add(b)))?,
            Ineg => {
                let a = self.pop_i()?;
                self.push(Value::int(a.wrapping_neg()));
            }
            Imul => self.binop_i(|a, b| Ok(a.wrapping_mul(b)))?,
            Idiv => self.binop_i(|a, b| stb_div_eucl(a, b).map(|(q, _)| q))?,
            Imod => self.binop_i(|a, b| stb_div_eucl(a, b).map(|(_, r)| r))?,
            Iband => self.binop_i(|a, b| Ok(a & b))?,
            Ibor => self.binop_i(|a, b| Ok(a | b))?,
            Ibxor => self.binop_i(|a, b| Ok(a ^ b))?,
            Ibnot => {
                let a = self.pop_i()?;
                self.push(Value::int(!a));
            }
            Iland => self.binop_i(|a, b| Ok(((a != 0) && (b != 0)) as i32))?,
            Ilor => self.binop_i(|a, b| Ok(((a != 0) || (b != 0)) as i32))?,
            Ilxor => self.binop_i(|a, b| Ok(((a != 0) ^ (b != 0)) as i32))?,
            Ilnot => {
                let a = self.pop_i()?;
                self.push(Value::int((a == 0) as i32));
            }
            Ilshift => self.binop_i(|a, b| Ok(a.wrapping_shl(b as u32)))?,
            Irshift => self.binop_i(|a, b| Ok(a.wrapping_shr(b as u32)))?,
            Ilt => self.cmp_i(|a, b| a < b)?,
            Ile => self.cmp_i(|a, b| a <= b)?,
            Ieq => self.cmp_i(|a, b| a == b)?,
            Ine => self.cmp_i(|a, b| a != b)?,
            Ige => self.cmp_i(|a, b| a >= b)?,
            Igt => self.cmp_i(|a, b| a > b)?,

            Arrnew => {
                let h = self.vals.new_array();
                self.push(Value::handle(Type::Arr, h));
            }
            Arrlen => {
                let arr = self.pop()?;
                let len = self.vals.array(arr.as_i32_bits())?.len();
                self.push(Value::int(len as i32));
            }
            Arrget => {
                let i = self.pop_i()?;
                let arr = self.pop()?;
                let items = self.vals.array(arr.as_i32_bits())?;
                let v = *items.get(i as usize).ok_or(Error::IndexOutOfBounds {
                    index: i,
                    len: items.len(),
                })?;
                self.push(v);
            }
            Arrput => {
                let item = self.pop()?;
                let arr = self.pop()?;
                self.vals.array_mut(arr.as_i32_bits())?.push(item);
                self.push(arr);
            }
            Arrpop => {
                let arr = self.pop()?;
                let item = self
                    .vals
                    .array_mut(arr.as_i32_bits())?
                    .pop()
                    .ok_or(Error::IndexOutOfBounds {
                        index: -1,
                        len: 0,
                    })?;
                self.push(arr);
                self.push(item);
            }
            Arrset => {
                let value = self.pop()?;
                let index = self.pop_i()?;
                let arr = self.pop()?;
                let handle = arr.as_i32_bits();
                let len = self.vals.array(handle)?.len();
                let slot = self
                    .vals
                    .array_mut(handle)?
                    .get_mut(index as usize)
                    .ok_or(Error::IndexOutOfBounds { index, len })?;
                *slot = value;
                self.push(arr);
            }
            Arrjoin => {
                let b = self.pop()?;
                let a = self.pop()?;
                let b_items = self.vals.array(b.as_i32_bits())?.clone();
                self.vals
                    .array_mut(a.as_i32_bits())?
                    .extend(b_items);
                self.push(a);
            }
            Arrsplit => {
                let pivot = self.pop_i()?;
                let arr = self.pop()?;
                let handle = arr.as_i32_bits();
                let tail = {
                    let items = self.vals.array_mut(handle)?;
                    if pivot as usize > items.len() {
                        return Err(Error::IndexOutOfBounds {
                            index: pivot,
                            len: items.len(),
                        });
                    }
                    items.split_off(pivot as usize)
                };
                let tail_handle = self.vals.new_array();
                *self.vals.array_mut(tail_handle)? = tail;
                self.push(arr);
                self.push(Value::handle(Type::Arr, tail_handle));
            }

            Mapnew => {
                let h = self.vals.new_map();
                self.push(Value::handle(Type::Map, h));
            }
            Maphas => {
                let key = self.pop()?;
                let map = self.pop()?;
                let found = self
                    .vals
                    .map_mut(map.as_i32_bits())?
                    .iter()
                    .any(|(k, _)| values_equal(*k, key));
                self.push(Value::int(found as i32));
            }
            Mapget => {
                let key = self.pop()?;
                let map = self.pop()?;
                let value = self
                    .vals
                    .map_mut(map.as_i32_bits())?
                    .iter()
                    .find(|(k, _)| values_equal(*k, key))
                    .map(|(_, v)| *v)
                    .ok_or(Error::UnknownMapKey)?;
                self.push(value);
            }
            Mapset => {
                let value = self.pop()?;
                let key = self.pop()?;
                let map = self.pop()?;
                let entries = self.vals.map_mut(map.as_i32_bits())?;
                if let Some(slot) = entries.iter_mut().find(|(k, _)| values_equal(*k, key)) {
                    slot.1 = value;
                } else {
                    entries.push((key, value));
                }
                self.push(map);
            }
            Mapdel => {
                let key = self.pop()?;
                let map = self.pop()?;
                self.vals
                    .map_mut(map.as_i32_bits())?
                    .retain(|(k, _)| !values_equal(*k, key));
                self.push(map);
            }

            There => self.push(Value::int(self.sew_cursor as i32)),
            Navigate => {
                let addr = self.pop_i()?;
                self.sew_cursor = addr as usize;
            }
            Sew => {
                let v = self.pop()?;
                self.sew_write(v.as_i32_bits());
            }
            SewJmp | SewJmp0 | SewJsr => {
                let addr = self.pop_i()?;
                let op2 = match op {
                    SewJmp => Jmp,
                    SewJmp0 => Jmp0,
                    SewJsr => Jsr,
                    _ => unreachable!(),
                };
                self.sew_write(op2.to_i32());
                self.sew_write(addr);
            }
            SewAddr => {
                let addr = self.pop_i()?;
                self.sew_write(addr);
            }
            SewLit => {
                let v = self.pop()?;
                match v.ty {
                    Type::Float => {
                        self.sew_write(FloatLiteral.to_i32());
                        self.sew_write(v.as_i32_bits());
                    }
                    _ => {
                        self.sew_write(IntLiteral.to_i32());
                        self.sew_write(v.as_i32_bits());
                    }
                }
            }
            SewColon | SewSemicolon => {
                // Word-table bookkeeping for sewn definitions lives in
                // the compiler, which observes `sew_cursor` before and
                // after comptime execution; nothing to do at the VM level.
            }

            IntLiteral | FloatLiteral => {
                let operand = self.read_word()?;
                self.push(Value {
                    ty: if op == FloatLiteral {
                        Type::Float
                    } else {
                        Type::Int
                    },
                    payload: if op == FloatLiteral {
                        Payload::F(f32::from_bits(operand as u32))
                    } else {
                        Payload::I(operand)
                    },
                });
            }
            Jmp => {
                let addr = self.read_word()?;
                self.pc = addr;
            }
            Jmp0 => {
                let addr = self.read_word()?;
                let cond = self.pop_i()?;
                if cond == 0 {
                    self.pc = addr;
                }
            }
            Jsr => {
                let addr = self.read_word()?;
                self.rstack.push(self.pc);
                self.pc = addr;
            }
        }
        Ok(true)
    }

    /// Runs `addr` as a subroutine: pushes a sentinel return address past
    /// the end of the program (so the matching `RETURN` halts execution
    /// cleanly rather than underflowing the return stack) and runs until
    /// that sentinel is reached. Used by the compiler to drive comptime
    /// word invocations (spec.md §4.6).
    pub fn call(&mut self, addr: i32) -> Result<()> {
        let sentinel = self.program.len() as i32;
        self.rstack.push(sentinel);
        self.pc = addr;
        loop {
            if self.pc == sentinel {
                return Ok(());
            }
            if !self.step()? {
                return Ok(());
            }
        }
    }

    /// Writes `word` at the current `sew_cursor`, appending if the cursor
    /// sits at the program's end or overwriting in place otherwise, then
    /// advances the cursor. Shared by the `SEW` family of ops and by the
    /// compiler's own program-buffer writes, which use the same cursor
    /// (spec.md §4.6: "compilation resumes with the cursor wherever the
    /// comptime word left it").
    pub fn sew_write(&mut self, word: i32) {
        if self.sew_cursor == self.program.len() {
            self.program.push(word);
        } else {
            self.program[self.sew_cursor] = word;
        }
        self.sew_cursor += 1;
    }

    fn binop_i(&mut self, f: impl Fn(i32, i32) -> Result<i32>) -> Result<()> {
        let b = self.pop_i()?;
        let a = self.pop_i()?;
        self.push(Value::int(f(a, b)?));
        Ok(())
    }

    fn cmp_i(&mut self, f: impl Fn(i32, i32) -> bool) -> Result<()> {
        let b = self.pop_i()?;
        let a = self.pop_i()?;
        self.push(Value::int(f(a, b) as i32));
        Ok(())
    }

    fn binop_f(&mut self, f: impl Fn(f32, f32) -> f32) -> Result<()> {
        let b = self.pop_f()?;
        let a = self.pop_f()?;
        self.push(Value::float(f(a, b)));
        Ok(())
    }

    fn cmp_f(&mut self, f: impl Fn(f32, f32) -> bool) -> Result<()> {
        let b = self.pop_f()?;
        let a = self.pop_f()?;
        self.push(Value::int(f(a, b) as i32));
        Ok(())
    }
}

/// Euclidean division/remainder (spec.md §4.7: "Euclidean, not
/// truncated"), matching the original's `stb_div_eucl`.
fn stb_div_eucl(a: i32, b: i32) -> Result<(i32, i32)> {
    if b == 0 {
        return Err(Error::DivisionByZero);
    }
    Ok((a.div_euclid(b), a.rem_euclid(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{quickcheck, TestResult};

    quickcheck! {
        /// spec.md §8 property 6: `(a I/ b) I* b I+ (a I% b) == a`.
        fn euclidean_identity(a: i32, b: i32) -> TestResult {
            if b == 0 || (b == -1 && a == i32::MIN) {
                return TestResult::discard();
            }
            let (q, r) = stb_div_eucl(a, b).unwrap();
            TestResult::from_bool(q.wrapping_mul(b).wrapping_add(r) == a)
        }
    }

    fn run(program: Vec<i32>) -> Vm {
        let mut vm = Vm::new(program, 0);
        vm.run().unwrap();
        vm
    }

    #[test]
    fn integer_literal_and_add() {
        let vm = run(vec![
            Op::IntLiteral.to_i32(),
            2,
            Op::IntLiteral.to_i32(),
            3,
            Op::Iadd.to_i32(),
        ]);
        assert_eq!(vm.stack(), &[Value::int(5)]);
    }

    #[test]
    fn euclidean_division_of_negative() {
        let vm = run(vec![
            Op::IntLiteral.to_i32(),
            -7,
            Op::IntLiteral.to_i32(),
            2,
            Op::Idiv.to_i32(),
        ]);
        assert_eq!(vm.stack(), &[Value::int(-4)]);
    }

    #[test]
    fn jump_skips_instructions() {
        let vm = run(vec![
            Op::Jmp.to_i32(),
            4,
            Op::IntLiteral.to_i32(),
            999,
            Op::IntLiteral.to_i32(),
            1,
        ]);
        assert_eq!(vm.stack(), &[Value::int(1)]);
    }

    #[test]
    fn jsr_and_return_roundtrip() {
        let vm = run(vec![
            Op::Jsr.to_i32(),
            4,
            Op::Halt.to_i32(),
            0,
            Op::IntLiteral.to_i32(),
            42,
            Op::Return.to_i32(),
        ]);
        assert_eq!(vm.stack(), &[Value::int(42)]);
    }

    #[test]
    fn array_put_len_get() {
        let mut vm = Vm::new(
            vec![
                Op::Arrnew.to_i32(),
                Op::IntLiteral.to_i32(),
                10,
                Op::Arrput.to_i32(),
                Op::Arrlen.to_i32(),
            ],
            0,
        );
        vm.run().unwrap();
        assert_eq!(vm.stack(), &[Value::int(1)]);
    }

    #[test]
    fn map_set_then_get() {
        let mut vm = Vm::new(
            vec![
                Op::Mapnew.to_i32(),
                Op::IntLiteral.to_i32(),
                1,
                Op::IntLiteral.to_i32(),
                77,
                Op::Mapset.to_i32(),
                Op::IntLiteral.to_i32(),
                1,
                Op::Mapget.to_i32(),
            ],
            0,
        );
        vm.run().unwrap();
        assert_eq!(vm.stack(), &[Value::int(77)]);
    }

    #[test]
    fn stack_underflow_is_an_error_not_a_panic() {
        let mut vm = Vm::new(vec![Op::Iadd.to_i32()], 0);
        assert!(matches!(vm.run(), Err(Error::StackUnderflow { .. })));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let mut vm = Vm::new(
            vec![
                Op::IntLiteral.to_i32(),
                1,
                Op::IntLiteral.to_i32(),
                0,
                Op::Idiv.to_i32(),
            ],
            0,
        );
        assert_eq!(vm.run(), Err(Error::DivisionByZero));
    }

    #[test]
    fn call_runs_subroutine_and_returns() {
        let mut vm = Vm::new(
            vec![Op::IntLiteral.to_i32(), 7, Op::Return.to_i32()],
            0,
        );
        vm.call(0).unwrap();
        assert_eq!(vm.stack(), &[Value::int(7)]);
    }

    #[test]
    fn sew_appends_words_at_cursor() {
        let mut vm = Vm::new(vec![], 0);
        vm.push(Value::int(Op::Nop.to_i32()));
        vm.exec(Op::Sew).unwrap();
        assert_eq!(vm.program, vec![Op::Nop.to_i32()]);
        assert_eq!(vm.sew_cursor, 1);
    }
}
