//! Compile-and-execute tests for the bytecode pipeline.

use std::collections::VecDeque;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use crate::error::{ErrorKind, RuntimeError};
use crate::object::Value;
use crate::parser::parse_source;

use super::code::{CodeObject, Constant};
use super::opcode::Op;
use super::vm::{Completion, InputSource, Machine};
use super::Compiler;

fn compile(source: &str) -> Rc<CodeObject> {
    let program = parse_source(source).unwrap();
    Compiler::compile(&program, "<test>").unwrap()
}

fn run(source: &str) -> (Completion, Machine) {
    let code = compile(source);
    let mut machine = Machine::with_capture();
    let completion = machine.execute(code, None);
    (completion, machine)
}

fn run_value(source: &str) -> Value {
    match run(source).0 {
        Completion::Normal(Some(value)) => value,
        other => panic!("expected a produced value, got {:?}", other),
    }
}

fn run_err(source: &str) -> RuntimeError {
    match run(source).0 {
        Completion::UnhandledError(err) | Completion::ErrorInHandling(err) => err,
        other => panic!("expected an error, got {:?}", other),
    }
}

/// Decode the instruction stream back into per-instruction stack effects.
fn decoded_effects(code: &CodeObject) -> Vec<i32> {
    let bytes = &code.code;
    let mut offset = 0;
    let mut effects = Vec::new();
    while offset + 1 < bytes.len() {
        let mut arg: u32 = 0;
        let mut op_byte = bytes[offset];
        while op_byte == Op::ExtArg as u8 {
            arg = (arg << 8) | bytes[offset + 1] as u32;
            offset += 2;
            op_byte = bytes[offset];
        }
        arg = (arg << 8) | bytes[offset + 1] as u32;
        offset += 2;
        let op = Op::from_byte(op_byte).unwrap();
        effects.push(
            op.stack_effect()
                .or_else(|| op.dynamic_stack_effect(arg))
                .unwrap(),
        );
    }
    effects
}

fn assert_code_equal(a: &CodeObject, b: &CodeObject) {
    assert_eq!(a.code, b.code);
    assert_eq!(a.varnames, b.varnames);
    assert_eq!(a.lnotab, b.lnotab);
    assert_eq!(a.stack_size, b.stack_size);
    assert_eq!(a.consts.len(), b.consts.len());
    for (x, y) in a.consts.iter().zip(b.consts.iter()) {
        match (x, y) {
            (Constant::Code(cx), Constant::Code(cy)) => assert_code_equal(cx, cy),
            (x, y) => assert!(x == y, "constant mismatch: {:?} vs {:?}", x, y),
        }
    }
}

// ===== Compilation properties =====

#[test]
fn branch_free_stack_size_is_the_max_prefix_sum() {
    let code = compile("a = 1 + 2 * 3\nb = a + 4");
    let effects = decoded_effects(&code);
    let mut depth = 0;
    let mut max = 0;
    for effect in effects {
        depth += effect;
        max = max.max(depth);
    }
    assert_eq!(code.stack_size, max as usize);
}

#[test]
fn compiling_twice_is_byte_identical() {
    let source = "
x = 1
func fib(n) {
    if n < 2 { return n }
    return fib(n - 1) + fib(n - 2)
}
while x < 5 {
    try { x = x + fib(x) } catch e { break } finally { y = 1 }
}
";
    let a = compile(source);
    let b = compile(source);
    assert_code_equal(&a, &b);
}

#[test]
fn constants_are_interned_by_equality() {
    let code = compile("a = 1\nb = 1\nc = 1.0\nd = true\ne = \"s\"\nf = \"s\"");
    // 1 appears once, 1.0 and true are distinct, "s" appears once, plus
    // the implicit-return null.
    let ints = code
        .consts
        .iter()
        .filter(|c| matches!(c, Constant::Int(1)))
        .count();
    let strs = code
        .consts
        .iter()
        .filter(|c| matches!(c, Constant::Str(s) if s == "s"))
        .count();
    assert_eq!(ints, 1);
    assert_eq!(strs, 1);
    assert!(code.consts.iter().any(|c| matches!(c, Constant::Float(_))));
    assert!(code.consts.iter().any(|c| matches!(c, Constant::Bool(true))));
}

#[test]
fn wide_constant_pools_use_extended_operands() {
    // More than 256 distinct constants forces EXT_ARG prefixes.
    let mut source = String::from("total = 0\n");
    for i in 0..300 {
        source.push_str(&format!("total = total + {}\n", i));
    }
    source.push_str("return total");
    let value = run_value(&source);
    assert_eq!(value, Value::Int((0..300).sum::<i64>()));
}

#[test]
fn break_outside_loop_is_a_compile_error() {
    let program = parse_source("break").unwrap();
    assert!(Compiler::compile(&program, "<test>").is_err());
    let program = parse_source("continue").unwrap();
    assert!(Compiler::compile(&program, "<test>").is_err());
}

#[test]
fn line_numbers_survive_compilation() {
    let code = compile("a = 1\nb = 2\n\nc = 3");
    assert_eq!(code.first_line, 1);
    // The last stored line should be 4.
    let last_offset = code.code.len() - 2;
    assert!(code.line_at(last_offset) >= 3);
}

// ===== End-to-end execution =====

#[test]
fn while_loop_end_to_end() {
    let source = "sum = 0; i = 0; while i < 5 { sum = sum + i; i = i + 1 }; return sum";
    let (completion, _) = run(source);
    match completion {
        Completion::Normal(Some(Value::Int(10))) => {}
        other => panic!("expected Normal(10), got {:?}", other),
    }
}

#[test]
fn arithmetic_and_precedence() {
    assert_eq!(run_value("return 2 + 3 * 4"), Value::Int(14));
    assert_eq!(run_value("return (2 + 3) * 4"), Value::Int(20));
    assert_eq!(run_value("return 2 ^ 3 ^ 2"), Value::Int(512));
    assert_eq!(run_value("return 7 % 3"), Value::Int(1));
    assert_eq!(run_value("return 5 / 2"), Value::Float(2.5));
}

#[test]
fn logical_short_circuit() {
    assert_eq!(run_value("return 1 < 2 && \"yes\" || \"no\""), Value::string("yes"));
    assert_eq!(run_value("return 1 > 2 && \"yes\" || \"no\""), Value::string("no"));
    // The right side must not evaluate when short-circuited.
    let source = "
hits = 0
func bump() { global hits; hits = hits + 1; return true }
ok = false && bump()
return hits";
    assert_eq!(run_value(source), Value::Int(0));
}

#[test]
fn for_loop_with_continue() {
    let source = "
sum = 0
for i = 0; i < 10; i = i + 1 {
    if i % 2 == 1 { continue }
    sum = sum + i
}
return sum";
    assert_eq!(run_value(source), Value::Int(20));
}

#[test]
fn arrays_and_maps() {
    assert_eq!(run_value("a = [1, 2, 3]\nreturn a[1]"), Value::Int(2));
    assert_eq!(run_value("a = [1, 2, 3]\na[0] = 9\nreturn a[0]"), Value::Int(9));
    assert_eq!(run_value("a = [1, 2]\nreturn a[-1]"), Value::Int(2));
    assert_eq!(
        run_value("m = {\"a\": 1, \"b\": 2}\nreturn m[\"b\"]"),
        Value::Int(2)
    );
    assert_eq!(
        run_value("m = {}\nm[\"k\"] = 5\nreturn m[\"k\"]"),
        Value::Int(5)
    );
    assert_eq!(run_value("return len([1, 2, 3])"), Value::Int(3));
}

#[test]
fn functions_and_recursion() {
    let source = "
func fib(n) {
    if n < 2 { return n }
    return fib(n - 1) + fib(n - 2)
}
return fib(10)";
    assert_eq!(run_value(source), Value::Int(55));
}

#[test]
fn anonymous_functions_are_first_class() {
    let source = "
twice = func (f, x) { return f(f(x)) }
inc = func (x) { return x + 1 }
return twice(inc, 5)";
    assert_eq!(run_value(source), Value::Int(7));
}

#[test]
fn print_writes_one_line() {
    let (_, machine) = run("print 1 + 1, \"x\"");
    assert_eq!(machine.out.lines(), ["2 x"]);
}

#[test]
fn input_binds_whitespace_separated_words() {
    let code = compile("input \"? \" -> a, b\nreturn a + b");
    let mut machine = Machine::with_capture();
    machine.input = InputSource::Scripted(VecDeque::from(["3 4".to_string()]));
    match machine.execute(code, None) {
        Completion::Normal(Some(value)) => assert_eq!(value, Value::string("34")),
        other => panic!("expected value, got {:?}", other),
    }
}

#[test]
fn input_count_mismatch_raises() {
    let code = compile("input \"? \" -> a, b");
    let mut machine = Machine::with_capture();
    machine.input = InputSource::Scripted(VecDeque::from(["only-one".to_string()]));
    match machine.execute(code, None) {
        Completion::UnhandledError(err) => assert_eq!(err.kind, ErrorKind::TypeMismatch),
        other => panic!("expected error, got {:?}", other),
    }
}

// ===== Closures =====

#[test]
fn sibling_closures_share_the_captured_scope() {
    let source = "
func outer() {
    x = 1
    func h() { x = 2 }
    func g() { return x }
    h()
    return g()
}
return outer()";
    assert_eq!(run_value(source), Value::Int(2));
}

#[test]
fn closure_counter_keeps_state_between_calls() {
    let source = "
func make() {
    n = 0
    func inc() { n = n + 1; return n }
    return inc
}
c = make()
c()
c()
return c()";
    assert_eq!(run_value(source), Value::Int(3));
}

#[test]
fn nested_closures_chain_scopes() {
    let source = "
func a() {
    x = 10
    func b() {
        y = 20
        func c() { return x + y }
        return c()
    }
    return b()
}
return a()";
    assert_eq!(run_value(source), Value::Int(30));
}

#[test]
fn module_level_functions_do_not_capture() {
    // x is read from globals, not captured: rebinding x is visible.
    let source = "
x = 1
func f() { return x }
x = 2
return f()";
    assert_eq!(run_value(source), Value::Int(2));
}

// ===== Calls and arity =====

#[test]
fn arity_mismatch_raises_and_never_partially_binds() {
    let source = "
func f(a, b) { return a }
f(1)";
    let err = run_err(source);
    assert_eq!(err.kind, ErrorKind::ArityMismatch);

    let source = "
func f(a, b) { return a }
f(1, 2, 3)";
    let err = run_err(source);
    assert_eq!(err.kind, ErrorKind::ArityMismatch);

    // The failed call must leave no binding behind.
    let source = "
func f(a, b) { return a }
try { f(99) } catch e { }
return a";
    let err = run_err(source);
    assert_eq!(err.kind, ErrorKind::Name);
}

#[test]
fn calling_a_non_callable_raises() {
    let err = run_err("x = 3\nx(1)");
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}

#[test]
fn recursion_limit_is_enforced() {
    let code = compile("func f() { return f() }\nf()");
    let mut machine = Machine::with_capture();
    machine.recursion_limit = 64;
    match machine.execute(code, None) {
        Completion::UnhandledError(err) => assert_eq!(err.kind, ErrorKind::RecursionLimit),
        other => panic!("expected recursion error, got {:?}", other),
    }
}

#[test]
fn builtin_arity_is_checked_before_invocation() {
    let err = run_err("len()");
    assert_eq!(err.kind, ErrorKind::ArityMismatch);
}

// ===== Errors and unwinding =====

#[test]
fn zero_division_is_catchable_by_kind() {
    let source = "
r = \"\"
try { x = 1 / 0 } catch TypeError e { r = \"t\" } catch ZeroDivisionError e { r = \"z\" } catch e { r = \"other\" }
return r";
    assert_eq!(run_value(source), Value::string("z"));
}

#[test]
fn unmatched_kinds_reraise_to_the_outer_handler() {
    let source = "
caught = \"\"
try {
    try { throw \"boom\" } catch TypeError e { caught = \"inner\" }
} catch e { caught = e.message }
return caught";
    assert_eq!(run_value(source), Value::string("boom"));
}

#[test]
fn errors_propagate_across_frames() {
    let source = "
func inner() { return 1 / 0 }
func outer() { return inner() }
r = \"\"
try { outer() } catch ZeroDivisionError e { r = \"caught\" }
return r";
    assert_eq!(run_value(source), Value::string("caught"));
}

#[test]
fn error_values_expose_kind_message_and_line() {
    let source = "
try { throw \"boom\" } catch e { return e.kind + \":\" + e.message }";
    assert_eq!(run_value(source), Value::string("Throw:boom"));
}

#[test]
fn operand_stack_is_restored_after_a_mid_expression_raise() {
    let source = "
r = 0
try { x = 1 + 1 / 0 } catch e { r = 7 }
return r + 1";
    assert_eq!(run_value(source), Value::Int(8));
}

#[test]
fn uncaught_error_reports_the_raise_time_frame_chain() {
    let source = "a = 1
func inner() { return 1 / 0 }
func outer() { return inner() }
outer()";
    let err = run_err(source);
    assert_eq!(err.kind, ErrorKind::ZeroDivision);
    let names: Vec<&str> = err.trace.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["<main>", "outer", "inner"]);
    assert_eq!(err.trace[2].line, 2);
    assert_eq!(err.trace[1].line, 3);
    assert_eq!(err.trace[0].line, 4);
    let rendered = err.render();
    assert!(rendered.contains("in 'inner' at line 2"));
    assert!(rendered.ends_with("ZeroDivisionError: division by zero"));
}

#[test]
fn raising_while_handling_is_reported_as_nested() {
    let (completion, _) = run("try { throw \"a\" } catch e { throw \"b\" }");
    match completion {
        Completion::ErrorInHandling(err) => {
            assert_eq!(err.message, "b");
            assert_eq!(err.context.as_ref().unwrap().message, "a");
        }
        other => panic!("expected nested error, got {:?}", other),
    }
}

#[test]
fn rethrowing_a_caught_error_preserves_its_kind() {
    let source = "
r = \"\"
try {
    try { x = 1 / 0 } catch e { throw e }
} catch ZeroDivisionError e { r = \"again\" }
return r";
    assert_eq!(run_value(source), Value::string("again"));
}

#[test]
fn assert_raises_assertion_errors() {
    let err = run_err("assert 1 > 2");
    assert_eq!(err.kind, ErrorKind::Assertion);
    assert!(run("assert 1 < 2").0.is_normal());
}

// ===== finally semantics =====

#[test]
fn finally_runs_once_on_normal_completion() {
    let source = "
count = 0
try { x = 1 } finally { count = count + 1 }
return count";
    assert_eq!(run_value(source), Value::Int(1));
}

#[test]
fn finally_runs_once_on_return_and_the_value_survives() {
    let source = "
count = 0
func f() {
    global count
    try { return 41 } finally { count = count + 1 }
}
return f() + count";
    assert_eq!(run_value(source), Value::Int(42));
}

#[test]
fn finally_runs_once_on_raise() {
    let source = "
count = 0
try {
    try { x = 1 / 0 } finally { count = count + 1 }
} catch e { }
return count";
    assert_eq!(run_value(source), Value::Int(1));
}

#[test]
fn break_through_a_finally_runs_it_exactly_once() {
    let source = "
count = 0
i = 0
while i < 5 {
    i = i + 1
    try { break } finally { count = count + 1 }
}
return count";
    assert_eq!(run_value(source), Value::Int(1));
}

#[test]
fn break_in_a_loop_inside_a_try_runs_the_finally_once() {
    let source = "
count = 0
i = 0
try {
    while true {
        i = i + 1
        if i == 3 { break }
    }
} finally { count = count + 1 }
return count";
    assert_eq!(run_value(source), Value::Int(1));
}

#[test]
fn continue_through_a_finally_runs_it_per_iteration() {
    let source = "
count = 0
i = 0
while i < 3 {
    i = i + 1
    try { continue } finally { count = count + 1 }
}
return count";
    assert_eq!(run_value(source), Value::Int(3));
}

#[test]
fn error_raised_in_finally_supersedes_the_pending_one() {
    let source = "
r = \"\"
func f() { try { throw \"original\" } finally { throw \"superseded\" } }
try { f() } catch e { r = e.message }
return r";
    assert_eq!(run_value(source), Value::string("superseded"));
}

#[test]
fn return_in_finally_supersedes_the_pending_error() {
    let source = "
func f() { try { throw \"pending\" } finally { return 5 } }
return f()";
    assert_eq!(run_value(source), Value::Int(5));
}

#[test]
fn nested_finallys_all_run_on_return() {
    let source = "
order = []
func f() {
    try {
        try { return 1 } finally { append(order, \"inner\") }
    } finally { append(order, \"outer\") }
}
f()
return order";
    let value = run_value(source);
    assert_eq!(
        value,
        Value::array(vec![Value::string("inner"), Value::string("outer")])
    );
}

// ===== Structs and methods =====

#[test]
fn struct_definition_and_field_access() {
    let source = "
struct Point { x; y }
p = new(Point)
p.x = 3
p.y = 4
return p.x + p.y";
    assert_eq!(run_value(source), Value::Int(7));
}

#[test]
fn methods_bind_their_receiver() {
    let source = "
struct Point { x; y }
func (Point) sum() { return this.x + this.y }
p = new(Point)
p.x = 3
p.y = 4
return p.sum()";
    assert_eq!(run_value(source), Value::Int(7));
}

#[test]
fn missing_attribute_raises() {
    let source = "
struct Point { x; y }
p = new(Point)
return p.z";
    let err = run_err(source);
    assert_eq!(err.kind, ErrorKind::AttributeMissing);
}

#[test]
fn type_builtin_reports_struct_names() {
    let source = "
struct Point { x }
p = new(Point)
return type(p)";
    assert_eq!(run_value(source), Value::string("Point"));
}

// ===== Globals =====

#[test]
fn global_declaration_routes_stores_to_the_module_scope() {
    let source = "
x = 1
func set() { global x; x = 99 }
set()
return x";
    assert_eq!(run_value(source), Value::Int(99));
}

#[test]
fn without_global_a_function_store_stays_local() {
    let source = "
x = 1
func set() { x = 99 }
set()
return x";
    assert_eq!(run_value(source), Value::Int(1));
}

// ===== Name resolution =====

#[test]
fn unknown_names_raise_name_errors() {
    let err = run_err("return nope");
    assert_eq!(err.kind, ErrorKind::Name);
    assert!(err.message.contains("nope"));
}

#[test]
fn builtins_are_shadowed_by_globals() {
    let source = "
len = func (x) { return 42 }
return len([1])";
    assert_eq!(run_value(source), Value::Int(42));
}

// ===== REPL mode =====

#[test]
fn repl_mode_produces_the_value_of_a_lone_expression() {
    let program = parse_source("1 + 2").unwrap();
    let code = Compiler::compile_repl(&program, "<repl>").unwrap();
    let mut machine = Machine::with_capture();
    match machine.execute(code, None) {
        Completion::Normal(Some(value)) => assert_eq!(value, Value::Int(3)),
        other => panic!("expected value, got {:?}", other),
    }
}

#[test]
fn repl_globals_persist_across_lines() {
    let mut machine = Machine::with_capture();
    for (line, expected) in [("x = 41", None), ("x + 1", Some(Value::Int(42)))] {
        let program = parse_source(line).unwrap();
        let code = Compiler::compile_repl(&program, "<repl>").unwrap();
        match (machine.execute(code, None), expected) {
            (Completion::Normal(value), expected) => assert_eq!(value, expected),
            (other, _) => panic!("unexpected completion {:?}", other),
        }
    }
}

#[test]
fn repl_survives_an_uncaught_error() {
    let mut machine = Machine::with_capture();
    let program = parse_source("1 / 0").unwrap();
    let code = Compiler::compile_repl(&program, "<repl>").unwrap();
    assert!(!machine.execute(code, None).is_normal());
    let program = parse_source("2 + 2").unwrap();
    let code = Compiler::compile_repl(&program, "<repl>").unwrap();
    match machine.execute(code, None) {
        Completion::Normal(Some(value)) => assert_eq!(value, Value::Int(4)),
        other => panic!("machine did not recover: {:?}", other),
    }
}

// ===== Imports =====

#[test]
fn imports_merge_the_module_namespace() {
    let dir = std::env::temp_dir();
    let path = dir.join("rill_import_test_a.rl");
    std::fs::write(&path, "answer = 42\nfunc double(x) { return x * 2 }\n").unwrap();

    let source = format!(
        "import \"{}\"\nreturn double(answer)",
        path.to_string_lossy()
    );
    assert_eq!(run_value(&source), Value::Int(84));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_modules_raise_import_errors() {
    let err = run_err("import \"definitely_not_here\"");
    assert_eq!(err.kind, ErrorKind::Import);
}

// ===== Embedding =====

#[test]
fn call_value_reenters_the_machine() {
    let code = compile("func add(a, b) { return a + b }");
    let mut machine = Machine::with_capture();
    assert!(machine.execute(code, None).is_normal());
    let add = machine.globals.borrow().get("add").cloned().unwrap();
    let result = machine
        .call_value(&add, vec![Value::Int(2), Value::Int(3)])
        .unwrap();
    assert_eq!(result, Value::Int(5));
}

#[test]
fn machines_are_isolated_from_each_other() {
    let mut a = Machine::with_capture();
    let mut b = Machine::with_capture();
    assert!(a.execute(compile("x = 1"), None).is_normal());
    assert!(b.execute(compile("x = 2"), None).is_normal());
    assert_eq!(a.globals.borrow().get("x"), Some(&Value::Int(1)));
    assert_eq!(b.globals.borrow().get("x"), Some(&Value::Int(2)));
}

#[test]
fn ordering_mismatched_kinds_raises() {
    let err = run_err("return 1 < \"a\"");
    assert_eq!(err.kind, ErrorKind::TypeMismatch);
}
