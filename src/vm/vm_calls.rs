//! The call protocol: interpreted frames and the foreign-callable bridge.

use std::rc::Rc;

use crate::error::{ErrorKind, RuntimeError, TraceEntry};
use crate::object::{self, function, new_scope, Callee, ForeignFunction, FunctionObj, Value};

use super::frame::Frame;
use super::vm::{FrameExit, Machine};

impl Machine {
    /// CALL_FUNC: invoke `callee` and push its result onto the calling
    /// frame's operand stack.
    pub(crate) fn call_with_frame(
        &mut self,
        frame: &mut Frame,
        callee: Value,
        args: Vec<Value>,
    ) -> Result<(), RuntimeError> {
        // The caller's trace entry must show the call site while the
        // callee runs.
        if let Some(top) = self.call_stack.last_mut() {
            top.line = frame.line;
        }
        let result = self.call_value_inner(callee, args)?;
        frame.push(result);
        Ok(())
    }

    /// Re-entrant embedding entry: call any callable value with positional
    /// arguments.
    pub fn call_value(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.call_value_inner(callee.clone(), args)
    }

    fn call_value_inner(
        &mut self,
        callee: Value,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        match function::classify(&callee) {
            Callee::Interpreted(func) => self.call_interpreted(func, args),
            Callee::Foreign(func) => self.call_foreign(func, args),
            Callee::NotCallable => Err(RuntimeError::type_error(format!(
                "{} object is not callable",
                object::behavior(&callee).name
            ))),
        }
    }

    /// Frame-push protocol. Arity is checked before anything binds — a
    /// mismatch never partially binds parameters.
    fn call_interpreted(
        &mut self,
        func: Rc<FunctionObj>,
        mut args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let code = func.code.clone();
        if args.len() != code.argcount {
            return Err(RuntimeError::arity_error(
                &func.name,
                code.argcount,
                args.len(),
            ));
        }
        if self.call_stack.len() >= self.recursion_limit {
            return Err(RuntimeError::new(
                ErrorKind::RecursionLimit,
                "maximum recursion depth exceeded",
            ));
        }

        let locals = new_scope();
        {
            let mut bindings = locals.borrow_mut();
            if let Some(receiver) = &func.this {
                bindings.insert("this".to_string(), receiver.clone());
            }
            for (name, value) in code.varnames[..code.argcount].iter().zip(args.drain(..)) {
                bindings.insert(name.clone(), value);
            }
        }

        let mut frame = Frame::new(
            code.clone(),
            locals,
            func.captured.clone(),
            func.globals.clone(),
            self.builtins.clone(),
        );
        self.call_stack.push(TraceEntry {
            name: func.name.clone(),
            file: code.file.clone(),
            line: code.first_line,
        });
        let handling_depth = self.handling.len();
        let exit = self.run_frame(&mut frame);
        // Handled-error bookkeeping cannot outlive the frame that was
        // doing the handling.
        self.handling.truncate(handling_depth);
        self.call_stack.pop();
        match exit {
            FrameExit::Return(value) => Ok(value),
            FrameExit::Raised(err) => Err(err),
        }
    }

    /// Foreign bridge: direct invocation with positional arguments; the
    /// declared arity is checked first, and failures surface through the
    /// same error taxonomy as interpreted calls.
    fn call_foreign(
        &mut self,
        func: Rc<ForeignFunction>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if let Some(arity) = func.arity {
            if args.len() != arity as usize {
                return Err(RuntimeError::arity_error(
                    func.name,
                    arity as usize,
                    args.len(),
                ));
            }
        }
        (func.func)(args)
    }
}
