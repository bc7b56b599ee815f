//! Raising, unwinding and the finally signal protocol.
//!
//! A raise packages a structured error with the frame chain captured at
//! that moment, then searches the raising frame's protected-region stack.
//! Catch regions receive the error value at their handler entry; finally
//! regions intercept every unwind (error, return, break, continue) and
//! resume it from END_FINALLY. An unhandled error leaves the frame and the
//! search continues in the caller.

use std::rc::Rc;

use crate::error::{RuntimeError, TraceEntry};
use crate::object::{Signal, Value};

use super::frame::{Frame, TryBlock};
use super::vm::{Flow, Machine};

impl Machine {
    /// The live frame chain, outermost first, with the raising frame's
    /// line fixed up to the instruction being executed.
    pub(crate) fn snapshot_trace(&self, frame: &Frame) -> Vec<TraceEntry> {
        let mut trace = self.call_stack.clone();
        if let Some(top) = trace.last_mut() {
            top.line = frame.line;
        }
        trace
    }

    /// Attach raise-time context to a fresh error. Errors that already
    /// carry a trace (rethrows, errors propagating from a callee) keep it
    /// and gain no context — rethrowing is not "another error".
    fn prepare_raise(&mut self, frame: &Frame, mut err: RuntimeError) -> RuntimeError {
        if err.trace.is_empty() {
            err.trace = self.snapshot_trace(frame);
            if err.context.is_none() {
                // The error being handled stops being handled and becomes
                // the new error's context.
                if let Some(being_handled) = self.handling.pop() {
                    err.context = Some(Box::new(being_handled));
                }
            }
        }
        err
    }

    /// Search this frame's protected regions for the raised error.
    /// `Ok(())` means the PC was diverted to a handler or finally body;
    /// `Err` propagates the error to the calling frame.
    pub(crate) fn raise_in_frame(
        &mut self,
        frame: &mut Frame,
        err: RuntimeError,
    ) -> Result<(), RuntimeError> {
        let err = self.prepare_raise(frame, err);

        while let Some(block) = frame.try_stack.pop() {
            match block {
                TryBlock::Catch {
                    handler,
                    stack_depth,
                } => {
                    frame.stack.truncate(stack_depth);
                    self.handling.push(err.clone());
                    frame.stack.push(Value::Error(Rc::new(err)));
                    frame.pc = handler;
                    return Ok(());
                }
                TryBlock::Finally {
                    target,
                    stack_depth,
                } => {
                    frame.stack.truncate(stack_depth);
                    frame.stack.push(Value::Signal(Rc::new(Signal::Raised(err))));
                    frame.pc = target;
                    return Ok(());
                }
            }
        }

        Err(err)
    }

    /// Return protocol: every enclosing finally region runs before the
    /// frame is left; catch-protections are simply discarded on the way.
    pub(crate) fn return_unwind(&mut self, frame: &mut Frame, value: Value) -> Flow {
        while let Some(block) = frame.try_stack.pop() {
            if let TryBlock::Finally {
                target,
                stack_depth,
            } = block
            {
                frame.stack.truncate(stack_depth);
                frame
                    .stack
                    .push(Value::Signal(Rc::new(Signal::Return(value))));
                frame.pc = target;
                return Flow::Jumped;
            }
        }
        Flow::Return(value)
    }

    /// Break protocol: unwind protected regions opened inside the
    /// innermost loop, then jump to its break target.
    pub(crate) fn break_unwind(&mut self, frame: &mut Frame) -> Flow {
        let loop_block = *frame
            .break_stack
            .last()
            .expect("BREAK_LOOP without a loop target");

        while frame.try_stack.len() > loop_block.try_depth {
            let block = frame.try_stack.pop().expect("try stack shrank unexpectedly");
            if let TryBlock::Finally {
                target,
                stack_depth,
            } = block
            {
                frame.stack.truncate(stack_depth);
                frame.stack.push(Value::Signal(Rc::new(Signal::Break)));
                frame.pc = target;
                return Flow::Jumped;
            }
        }

        frame.break_stack.pop();
        frame.stack.truncate(loop_block.stack_depth);
        frame.pc = loop_block.break_target;
        Flow::Jumped
    }

    /// Continue protocol: like break, but the loop stays active and the
    /// jump goes to the loop's continue target.
    pub(crate) fn continue_unwind(&mut self, frame: &mut Frame, target: usize) -> Flow {
        let loop_block = *frame
            .break_stack
            .last()
            .expect("CONTINUE_LOOP without a loop target");

        while frame.try_stack.len() > loop_block.try_depth {
            let block = frame.try_stack.pop().expect("try stack shrank unexpectedly");
            if let TryBlock::Finally {
                target: finally_target,
                stack_depth,
            } = block
            {
                frame.stack.truncate(stack_depth);
                frame
                    .stack
                    .push(Value::Signal(Rc::new(Signal::Continue(target))));
                frame.pc = finally_target;
                return Flow::Jumped;
            }
        }

        frame.stack.truncate(loop_block.stack_depth);
        frame.pc = target;
        Flow::Jumped
    }

    /// END_FINALLY: consume the unwind signal the finally body was entered
    /// with and resume the action it describes. A return, break or raise
    /// performed inside the finally body never reaches this instruction,
    /// which is what lets it supersede the held signal.
    pub(crate) fn end_finally(&mut self, frame: &mut Frame) -> Result<Flow, RuntimeError> {
        let value = frame.pop();
        let Value::Signal(signal) = value else {
            unreachable!("END_FINALLY without an unwind signal");
        };
        match &*signal {
            Signal::Normal => Ok(Flow::Next),
            Signal::Break => Ok(self.break_unwind(frame)),
            Signal::Continue(target) => Ok(self.continue_unwind(frame, *target)),
            Signal::Return(value) => Ok(self.return_unwind(frame, value.clone())),
            Signal::Raised(err) => Err(err.clone()),
        }
    }
}
