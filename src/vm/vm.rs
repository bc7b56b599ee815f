//! The Rill virtual machine: a stack-based fetch-decode-execute engine.
//!
//! One `Machine` owns one interpreter state (global and builtin scopes,
//! frame trace, error bookkeeping, I/O sinks); multiple machines coexist
//! and are tested in isolation. Intra-function control flow drives an
//! explicit program counter; invoking a nested function uses a real call
//! into [`Machine::run_frame`], and the unwind reason propagates back up
//! that call chain as a value.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::io::Write;
use std::rc::Rc;

use crate::error::{ErrorKind, RuntimeError, TraceEntry};
use crate::module::{FileResolver, ModuleResolver};
use crate::object::{
    self, new_scope, ArithOp, ScopeRef, Signal, StructType, Value,
};

use super::code::{Constant, CodeObject};
use super::frame::{Frame, LoopBlock, TryBlock};
use super::opcode::{Op, CMP_EQ, CMP_GE, CMP_GT, CMP_LE, CMP_LT, CMP_NE};

/// Frame-depth ceiling for the call protocol.
pub const MAX_RECURSION_DEPTH: usize = 800;

/// Where `print` output goes. Tests and embedders capture it.
pub enum OutputSink {
    Stdout,
    Capture { lines: Vec<String>, pending: String },
}

impl OutputSink {
    pub fn capture() -> Self {
        OutputSink::Capture {
            lines: Vec::new(),
            pending: String::new(),
        }
    }

    fn write(&mut self, text: &str) {
        match self {
            OutputSink::Stdout => {
                print!("{}", text);
                let _ = std::io::stdout().flush();
            }
            OutputSink::Capture { pending, .. } => pending.push_str(text),
        }
    }

    fn write_line(&mut self, text: &str) {
        match self {
            OutputSink::Stdout => println!("{}", text),
            OutputSink::Capture { lines, pending } => {
                pending.push_str(text);
                lines.push(std::mem::take(pending));
            }
        }
    }

    pub fn lines(&self) -> &[String] {
        match self {
            OutputSink::Stdout => &[],
            OutputSink::Capture { lines, .. } => lines,
        }
    }
}

/// Where `input` lines come from. Blocking on stdin blocks the single
/// thread of control; tests script it.
pub enum InputSource {
    Stdin,
    Scripted(VecDeque<String>),
}

impl InputSource {
    fn read_line(&mut self) -> Option<String> {
        match self {
            InputSource::Stdin => {
                let mut line = String::new();
                match std::io::stdin().read_line(&mut line) {
                    Ok(0) | Err(_) => None,
                    Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
                }
            }
            InputSource::Scripted(lines) => lines.pop_front(),
        }
    }
}

/// How a top-level execution ended.
#[derive(Debug)]
pub enum Completion {
    /// Ran to completion; carries the produced value of the main frame
    /// (None when it was null).
    Normal(Option<Value>),
    /// An error reached the bottom of the frame stack unhandled.
    UnhandledError(RuntimeError),
    /// The unhandled error was raised while another error was already
    /// being handled.
    ErrorInHandling(RuntimeError),
}

impl Completion {
    pub fn is_normal(&self) -> bool {
        matches!(self, Completion::Normal(_))
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Completion::Normal(v) => v.as_ref(),
            _ => None,
        }
    }
}

/// How one frame's execution ended, propagated up the frame call chain.
pub(crate) enum FrameExit {
    Return(Value),
    Raised(RuntimeError),
}

/// What an instruction asks the dispatch loop to do next.
pub(crate) enum Flow {
    /// Advance to the instruction the PC already points at.
    Next,
    /// The PC was set explicitly (jump or unwind divert).
    Jumped,
    /// Leave the frame with a value.
    Return(Value),
}

/// One virtual machine instance and its entire interpreter state.
pub struct Machine {
    pub globals: ScopeRef,
    pub builtins: ScopeRef,
    /// Live frame chain, outermost first, mirrored into stack traces at
    /// raise time.
    pub(crate) call_stack: Vec<TraceEntry>,
    /// Errors delivered to a catch clause and not yet marked handled.
    pub(crate) handling: Vec<RuntimeError>,
    pub recursion_limit: usize,
    pub out: OutputSink,
    pub input: InputSource,
    pub(crate) modules: HashMap<String, ScopeRef>,
    pub resolver: Box<dyn ModuleResolver>,
}

impl Machine {
    pub fn new() -> Self {
        Self {
            globals: new_scope(),
            builtins: crate::builtins::install(),
            call_stack: Vec::new(),
            handling: Vec::new(),
            recursion_limit: MAX_RECURSION_DEPTH,
            out: OutputSink::Stdout,
            input: InputSource::Stdin,
            modules: HashMap::new(),
            resolver: Box::new(FileResolver),
        }
    }

    /// A machine with captured output and scripted input, for tests and
    /// embedding.
    pub fn with_capture() -> Self {
        let mut machine = Self::new();
        machine.out = OutputSink::capture();
        machine.input = InputSource::Scripted(VecDeque::new());
        machine
    }

    /// Execute a compiled unit to completion. `globals` selects the global
    /// namespace; `None` uses the machine's own.
    pub fn execute(&mut self, code: Rc<CodeObject>, globals: Option<ScopeRef>) -> Completion {
        let globals = globals.unwrap_or_else(|| self.globals.clone());
        let mut frame = Frame::main(code.clone(), globals, self.builtins.clone());
        let handling_depth = self.handling.len();
        self.call_stack.push(TraceEntry {
            name: code.name.clone(),
            file: code.file.clone(),
            line: code.first_line,
        });
        let exit = self.run_frame(&mut frame);
        // Drop handling entries this execution left behind; a reentrant
        // execution (module load) must not disturb the importer's.
        self.handling.truncate(handling_depth);
        self.call_stack.pop();
        match exit {
            FrameExit::Return(Value::Null) => Completion::Normal(None),
            FrameExit::Return(value) => Completion::Normal(Some(value)),
            FrameExit::Raised(err) => {
                if err.context.is_some() {
                    Completion::ErrorInHandling(err)
                } else {
                    Completion::UnhandledError(err)
                }
            }
        }
    }

    /// The dispatch loop for one frame.
    pub(crate) fn run_frame(&mut self, frame: &mut Frame) -> FrameExit {
        let code = frame.code.clone();
        let bytes = &code.code;

        loop {
            let inst_offset = frame.pc;
            if inst_offset + 1 >= bytes.len() {
                return FrameExit::Return(Value::Null);
            }

            // Fetch, folding extended-operand prefixes into the operand.
            let mut pc = inst_offset;
            let mut arg: u32 = 0;
            let mut op_byte = bytes[pc];
            while op_byte == Op::ExtArg as u8 {
                arg = (arg << 8) | bytes[pc + 1] as u32;
                pc += 2;
                op_byte = bytes[pc];
            }
            arg = (arg << 8) | bytes[pc + 1] as u32;
            let op = Op::from_byte(op_byte).expect("invalid opcode in instruction stream");
            frame.pc = pc + 2;
            frame.line = code.line_at(inst_offset);

            match self.exec_op(frame, op, arg) {
                Ok(Flow::Next) | Ok(Flow::Jumped) => {}
                Ok(Flow::Return(value)) => return FrameExit::Return(value),
                Err(err) => match self.raise_in_frame(frame, err) {
                    Ok(()) => {}
                    Err(err) => return FrameExit::Raised(err),
                },
            }
        }
    }

    /// Execute one decoded instruction.
    fn exec_op(&mut self, frame: &mut Frame, op: Op, arg: u32) -> Result<Flow, RuntimeError> {
        match op {
            Op::ExtArg => unreachable!("prefixes are folded during fetch"),

            // --- Constants & names ---
            Op::LoadConst => {
                let value = frame.code.consts[arg as usize].to_value();
                frame.push(value);
            }
            Op::LoadName => {
                let name = &frame.code.varnames[arg as usize];
                match frame.load_name(name) {
                    Some(value) => frame.push(value),
                    None => return Err(RuntimeError::name_error(name)),
                }
            }
            Op::StoreName => {
                let value = frame.pop();
                let name = &frame.code.varnames[arg as usize];
                frame.store_name(name, value);
            }
            Op::StoreGlobal => {
                let value = frame.pop();
                let name = &frame.code.varnames[arg as usize];
                frame.store_global(name, value);
            }
            Op::LoadVarname => {
                let name = frame.code.varnames[arg as usize].clone();
                frame.push(Value::string(name));
            }

            // --- Attributes & subscripts ---
            Op::LoadAttr => {
                let obj = frame.pop();
                let name = &frame.code.varnames[arg as usize];
                frame.push(object::get_attr(&obj, name)?);
            }
            Op::StoreAttr => {
                let obj = frame.pop();
                let value = frame.pop();
                let name = &frame.code.varnames[arg as usize];
                object::set_attr(&obj, name, value)?;
            }
            Op::LoadSubscr => {
                let index = frame.pop();
                let obj = frame.pop();
                frame.push(object::get_item(&obj, &index)?);
            }
            Op::StoreSubscr => {
                let index = frame.pop();
                let obj = frame.pop();
                let value = frame.pop();
                object::set_item(&obj, &index, value)?;
            }

            // --- Stack manipulation ---
            Op::PopTop => {
                frame.pop();
            }
            Op::DupTop => {
                let value = frame.peek().clone();
                frame.push(value);
            }

            // --- Operators ---
            Op::UnaryNeg => {
                let value = frame.pop();
                frame.push(object::negate(&value)?);
            }
            Op::UnaryNot => {
                let value = frame.pop();
                frame.push(Value::Bool(!object::truthy(&value)));
            }
            Op::BinaryAdd => self.binary_op(frame, ArithOp::Add)?,
            Op::BinarySub => self.binary_op(frame, ArithOp::Sub)?,
            Op::BinaryMul => self.binary_op(frame, ArithOp::Mul)?,
            Op::BinaryDiv => self.binary_op(frame, ArithOp::Div)?,
            Op::BinaryRem => self.binary_op(frame, ArithOp::Rem)?,
            Op::BinaryPow => self.binary_op(frame, ArithOp::Pow)?,
            Op::CompareOp => {
                let b = frame.pop();
                let a = frame.pop();
                let result = match arg {
                    CMP_EQ => object::equals(&a, &b),
                    CMP_NE => !object::equals(&a, &b),
                    CMP_LT => object::order("<", &a, &b)?.is_lt(),
                    CMP_LE => object::order("<=", &a, &b)?.is_le(),
                    CMP_GT => object::order(">", &a, &b)?.is_gt(),
                    CMP_GE => object::order(">=", &a, &b)?.is_ge(),
                    other => unreachable!("bad comparison operand {}", other),
                };
                frame.push(Value::Bool(result));
            }

            // --- Jumps ---
            Op::Jump => {
                frame.pc = arg as usize;
                return Ok(Flow::Jumped);
            }
            Op::PopJumpIfFalse => {
                let value = frame.pop();
                if !object::truthy(&value) {
                    frame.pc = arg as usize;
                    return Ok(Flow::Jumped);
                }
            }
            Op::PopJumpIfTrue => {
                let value = frame.pop();
                if object::truthy(&value) {
                    frame.pc = arg as usize;
                    return Ok(Flow::Jumped);
                }
            }
            Op::JumpIfFalseOrPop => {
                if !object::truthy(frame.peek()) {
                    frame.pc = arg as usize;
                    return Ok(Flow::Jumped);
                }
                frame.pop();
            }
            Op::JumpIfTrueOrPop => {
                if object::truthy(frame.peek()) {
                    frame.pc = arg as usize;
                    return Ok(Flow::Jumped);
                }
                frame.pop();
            }

            // --- Loops ---
            Op::SetupLoop => {
                frame.break_stack.push(LoopBlock {
                    break_target: arg as usize,
                    stack_depth: frame.stack.len(),
                    try_depth: frame.try_stack.len(),
                });
            }
            Op::PopLoop => {
                frame.break_stack.pop().expect("POP_LOOP without a loop");
            }
            Op::BreakLoop => return Ok(self.break_unwind(frame)),
            Op::ContinueLoop => return Ok(self.continue_unwind(frame, arg as usize)),

            // --- Protected regions ---
            Op::SetupTry => {
                frame.try_stack.push(TryBlock::Catch {
                    handler: arg as usize,
                    stack_depth: frame.stack.len(),
                });
            }
            Op::PopTry => {
                let block = frame.try_stack.pop();
                debug_assert!(matches!(block, Some(TryBlock::Catch { .. })));
            }
            Op::SetupFinally => {
                frame.try_stack.push(TryBlock::Finally {
                    target: arg as usize,
                    stack_depth: frame.stack.len(),
                });
            }
            Op::PopFinally => {
                let block = frame.try_stack.pop();
                debug_assert!(matches!(block, Some(TryBlock::Finally { .. })));
            }
            Op::PushNormal => {
                frame.push(Value::Signal(Rc::new(Signal::Normal)));
            }
            Op::EndFinally => return self.end_finally(frame),
            Op::ExcMatch => {
                let kind = frame.pop();
                let error = frame.pop();
                let matched = match (&error, &kind) {
                    (Value::Error(err), Value::Str(name)) => err.kind.as_str() == &**name,
                    _ => false,
                };
                frame.push(Value::Bool(matched));
            }
            Op::CatchDone => {
                self.handling.pop();
            }
            Op::Throw => {
                let value = frame.pop();
                return Err(match value {
                    // Rethrowing a caught error preserves its kind and the
                    // trace captured when it was first raised.
                    Value::Error(err) => (*err).clone(),
                    other => RuntimeError::thrown(object::stringify(&other), other),
                });
            }
            Op::AssertFail => {
                let message = frame.pop();
                return Err(RuntimeError::new(
                    ErrorKind::Assertion,
                    object::stringify(&message),
                ));
            }

            // --- Functions ---
            Op::CallFunc => {
                let count = arg as usize;
                let args = frame.stack.split_off(frame.stack.len() - count);
                let callee = frame.pop();
                self.call_with_frame(frame, callee, args)?;
            }
            Op::ReturnValue => {
                let value = frame.pop();
                return Ok(self.return_unwind(frame, value));
            }
            Op::MakeFunction => {
                let Constant::Code(code) = &frame.code.consts[arg as usize] else {
                    unreachable!("MAKE_FUNCTION operand is not a code constant");
                };
                let captured = if code.flags.is_closure {
                    let mut scopes = Vec::with_capacity(frame.outer.len() + 1);
                    scopes.push(frame.locals.clone());
                    scopes.extend(frame.outer.iter().cloned());
                    scopes
                } else {
                    Vec::new()
                };
                let func = crate::object::FunctionObj::new(
                    code.name.clone(),
                    code.clone(),
                    captured,
                    frame.globals.clone(),
                );
                frame.push(Value::Function(Rc::new(func)));
            }
            Op::BindMethod => {
                let method = frame.pop();
                let name = &frame.code.varnames[arg as usize];
                let target = frame
                    .load_name(name)
                    .ok_or_else(|| RuntimeError::name_error(name))?;
                let Value::StructType(ty) = target else {
                    return Err(RuntimeError::type_error(format!(
                        "cannot bind a method to {} (struct type expected)",
                        object::behavior(&target).name
                    )));
                };
                let method_name = match &method {
                    Value::Function(func) => func.name.clone(),
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "cannot bind {} as a method",
                            object::behavior(other).name
                        )))
                    }
                };
                ty.methods.borrow_mut().insert(method_name, method);
            }

            // --- Aggregates ---
            Op::BuildArray => {
                let count = arg as usize;
                let items = frame.stack.split_off(frame.stack.len() - count);
                frame.push(Value::array(items));
            }
            Op::BuildMap => {
                let count = arg as usize;
                let mut flat = frame.stack.split_off(frame.stack.len() - count * 2);
                let mut entries = BTreeMap::new();
                for _ in 0..count {
                    let key = flat.remove(0);
                    let value = flat.remove(0);
                    entries.insert(object::hash_key(&key)?, value);
                }
                frame.push(Value::Map(Rc::new(std::cell::RefCell::new(entries))));
            }
            Op::BuildStruct => {
                let name = frame.pop();
                let count = arg as usize;
                let fields = frame.stack.split_off(frame.stack.len() - count);
                let field_names = fields
                    .iter()
                    .map(|f| match f {
                        Value::Str(s) => s.to_string(),
                        _ => unreachable!("struct field names are strings"),
                    })
                    .collect();
                let type_name = match &name {
                    Value::Str(s) => s.to_string(),
                    _ => unreachable!("struct type name is a string"),
                };
                frame.push(Value::StructType(Rc::new(StructType::new(
                    type_name,
                    field_names,
                ))));
            }

            // --- I/O & modules ---
            Op::Print => {
                let count = arg as usize;
                let values = frame.stack.split_off(frame.stack.len() - count);
                let parts: Vec<String> = values.iter().map(object::stringify).collect();
                self.out.write_line(&parts.join(" "));
            }
            Op::InputLine => {
                let count = arg as usize;
                let names = frame.stack.split_off(frame.stack.len() - count);
                let prompt = frame.pop();
                self.out.write(&object::stringify(&prompt));
                let line = self
                    .input
                    .read_line()
                    .ok_or_else(|| RuntimeError::foreign_error("end of input"))?;
                let words: Vec<&str> = line.split_whitespace().collect();
                if words.len() != names.len() {
                    return Err(RuntimeError::type_error(format!(
                        "input expected {} value(s), got {}",
                        names.len(),
                        words.len()
                    )));
                }
                for (name, word) in names.iter().zip(words) {
                    let Value::Str(name) = name else {
                        unreachable!("input targets are names");
                    };
                    frame.store_name(name, Value::string(word));
                }
            }
            Op::ImportName => {
                let Constant::Str(path) = &frame.code.consts[arg as usize] else {
                    unreachable!("IMPORT_NAME operand is not a string constant");
                };
                let namespace = crate::module::load_module(self, path, &frame.code.file)?;
                // A module importing itself gets its own namespace back.
                if !Rc::ptr_eq(&namespace, &frame.locals) {
                    let namespace = namespace.borrow();
                    let mut locals = frame.locals.borrow_mut();
                    for (name, value) in namespace.iter() {
                        locals.insert(name.clone(), value.clone());
                    }
                }
            }
        }

        Ok(Flow::Next)
    }

    fn binary_op(&mut self, frame: &mut Frame, op: ArithOp) -> Result<(), RuntimeError> {
        let b = frame.pop();
        let a = frame.pop();
        frame.push(object::arith(op, &a, &b)?);
        Ok(())
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
