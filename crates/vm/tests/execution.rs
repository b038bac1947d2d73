//! End-to-end execution tests: source → AST → bytecode → machine.

use quill_compiler::Compiler;
use quill_core::{Context, ErrorKind, Limits, Result};
use quill_object::{require_args, NativeFunction, Value};
use quill_syntax::parse;
use quill_vm::Machine;
use std::sync::Arc;
use std::time::Duration;

fn eval(source: &str) -> Result<Value> {
    let _ = env_logger::builder().is_test(true).try_init();
    let code = Compiler::new(None).compile_program(&parse(source)?)?;
    Machine::new(Context::background()).run(code)
}

fn eval_ok(source: &str) -> Value {
    eval(source).expect("evaluation succeeds")
}

#[test]
fn test_arithmetic_round_trip() {
    assert_eq!(eval_ok("1 + 1"), Value::Int(2));
    assert_eq!(eval_ok("7 % 3 + 2 * 10"), Value::Int(21));
    assert_eq!(eval_ok("2 ** 3 ** 2"), Value::Int(512));
    assert_eq!(eval_ok("1 + 2.5"), Value::Float(3.5));
    assert_eq!(eval_ok("(1 + 2) * 3"), Value::Int(9));
}

#[test]
fn test_empty_program_yields_nil() {
    assert_eq!(eval_ok(""), Value::Nil);
    assert_eq!(eval_ok("let x = 1"), Value::Nil);
}

#[test]
fn test_let_and_reassignment() {
    assert_eq!(eval_ok("let x = 1; x = x + 41; x"), Value::Int(42));
    assert_eq!(eval_ok("let a, b = [1, 2]; a * 10 + b"), Value::Int(12));
    assert_eq!(eval_ok("let x = 10; x /= 2; x -= 1; x"), Value::Int(4));
}

#[test]
fn test_if_else_and_ternary() {
    assert_eq!(eval_ok("let x = 0; if true { x = 1 } else { x = 2 }; x"), Value::Int(1));
    assert_eq!(eval_ok("let x = 0; if false { x = 1 } else { x = 2 }; x"), Value::Int(2));
    assert_eq!(eval_ok("1 < 2 ? \"yes\" : \"no\""), Value::string("yes"));
}

#[test]
fn test_short_circuit_preserves_value() {
    // The deciding operand comes back, not a coerced bool.
    assert_eq!(eval_ok("0 && 5"), Value::Int(0));
    assert_eq!(eval_ok("2 && 5"), Value::Int(5));
    assert_eq!(eval_ok("\"\" || \"fallback\""), Value::string("fallback"));
    assert_eq!(eval_ok("3 || 5"), Value::Int(3));
}

#[test]
fn test_short_circuit_skips_rhs_call() {
    // The callee is nil, so evaluating the right arm would throw.
    assert_eq!(eval_ok("let f = nil; 0 && f()"), Value::Int(0));
    assert_eq!(eval_ok("let f = nil; 1 || f()"), Value::Int(1));
}

#[test]
fn test_functions_defaults_and_rest() {
    assert_eq!(
        eval_ok("func add(a, b) { return a + b }; add(40, 2)"),
        Value::Int(42)
    );
    assert_eq!(
        eval_ok("func add(a, b=2) { a + b }; add(40)"),
        Value::Int(42)
    );
    assert_eq!(
        eval_ok("func tail(first, *rest) { rest }; tail(1, 2, 3)"),
        Value::list(vec![Value::Int(2), Value::Int(3)])
    );
    assert_eq!(
        eval_ok("func tail(first, *rest) { rest }; tail(1)"),
        Value::list(vec![])
    );
}

#[test]
fn test_arity_errors() {
    let err = eval("func fn(a, b) { a }; fn(1)").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Args);
    assert_eq!(err.message(), "fn: missing required argument: \"b\"");

    let err = eval("func fn(a, b) { a }; fn(1, 2, 3)").unwrap_err();
    assert_eq!(err.message(), "fn: expected 2 arguments, got 3");

    let err = eval("func fn(a, b=2) { a }; fn()").unwrap_err();
    assert_eq!(err.message(), "fn: missing required argument: \"a\"");

    let err = eval("func fn(a, b=2) { a }; fn(1, 2, 3)").unwrap_err();
    assert_eq!(err.message(), "fn: expected at most 2 arguments, got 3");
}

#[test]
fn test_closure_cell_sharing() {
    let source = "
        func make() {
            let x = 0
            return func() { x = x + 1; x }
        }
        let c = make()
        c()
        c()
        c()
    ";
    assert_eq!(eval_ok(source), Value::Int(3));
}

#[test]
fn test_two_closures_share_one_binding() {
    let source = "
        func make() {
            let x = 0
            let inc = func() { x = x + 1 }
            let get = func() { x }
            inc()
            inc()
            get()
        }
        make()
    ";
    assert_eq!(eval_ok(source), Value::Int(2));
}

#[test]
fn test_transitive_capture() {
    let source = "
        func outer() {
            let x = 10
            func middle() {
                func inner() { x + 1 }
                inner()
            }
            middle()
        }
        outer()
    ";
    assert_eq!(eval_ok(source), Value::Int(11));
}

#[test]
fn test_recursion() {
    let source = "
        func fib(n) {
            if n < 2 { return n }
            return fib(n - 1) + fib(n - 2)
        }
        fib(12)
    ";
    assert_eq!(eval_ok(source), Value::Int(144));
}

#[test]
fn test_for_loops() {
    assert_eq!(
        eval_ok("let sum = 0; for let i = 0; i < 5; i += 1 { sum += i }; sum"),
        Value::Int(10)
    );
    assert_eq!(
        eval_ok("let sum = 0; for x in [1, 2, 3] { sum += x }; sum"),
        Value::Int(6)
    );
    assert_eq!(
        eval_ok("let sum = 0; for i, x in [10, 20] { sum += i * 100 + x }; sum"),
        Value::Int(130)
    );
    assert_eq!(
        eval_ok("let sum = 0; for x in 0..5 { sum += x }; sum"),
        Value::Int(10)
    );
    assert_eq!(
        eval_ok("let n = 0; for n < 3 { n += 1 }; n"),
        Value::Int(3)
    );
}

#[test]
fn test_break_and_continue() {
    assert_eq!(
        eval_ok("let sum = 0; for x in [1, 2, 3, 4] { if x == 3 { break }; sum += x }; sum"),
        Value::Int(3)
    );
    assert_eq!(
        eval_ok("let sum = 0; for x in [1, 2, 3, 4] { if x % 2 == 0 { continue }; sum += x }; sum"),
        Value::Int(4)
    );
    assert_eq!(
        eval_ok(
            "let sum = 0; for let i = 0; i < 10; i += 1 { if i > 2 { continue }; sum += i }; sum"
        ),
        Value::Int(3)
    );
}

#[test]
fn test_map_iteration_sorted() {
    let source = "
        let m = {\"b\": 1, \"a\": 2, \"c\": 3}
        let out = []
        for k, v in m { out.append(k) }
        out
    ";
    assert_eq!(
        eval_ok(source),
        Value::list(vec![
            Value::string("a"),
            Value::string("b"),
            Value::string("c")
        ])
    );
}

#[test]
fn test_indexing_and_slicing() {
    assert_eq!(eval_ok("[10, 20, 30][-1]"), Value::Int(30));
    assert_eq!(eval_ok("\"héllo\"[1]"), Value::string("é"));
    assert_eq!(
        eval_ok("[1, 2, 3, 4][1:3]"),
        Value::list(vec![Value::Int(2), Value::Int(3)])
    );
    assert_eq!(eval_ok("\"hello\"[1:]"), Value::string("ello"));

    let err = eval("[1, 2][2]").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Index);
    assert_eq!(err.message(), "list index out of range: 2");
}

#[test]
fn test_map_attribute_sugar() {
    assert_eq!(eval_ok("let m = {a: 1}; m.a"), Value::Int(1));
    assert_eq!(eval_ok("let m = {}; m.x = 5; m[\"x\"]"), Value::Int(5));
    assert_eq!(eval_ok("let m = {count: 1}; m.count += 1; m.count"), Value::Int(2));
}

#[test]
fn test_optional_attribute() {
    assert_eq!(eval_ok("nil?.anything"), Value::Nil);
    assert_eq!(eval_ok("let m = {a: 1}; m?.a"), Value::Int(1));
    assert_eq!(eval_ok("let m = {a: 1}; m?.missing"), Value::Nil);
}

#[test]
fn test_string_methods_and_templates() {
    assert_eq!(eval_ok("\"a,b\".split(\",\")[1]"), Value::string("b"));
    assert_eq!(eval_ok("\"Quill\".to_upper()"), Value::string("QUILL"));
    assert_eq!(eval_ok("let name = \"world\"; 'hi {name}!'"), Value::string("hi world!"));
    assert_eq!(eval_ok("'{1 + 1} items'"), Value::string("2 items"));
}

#[test]
fn test_spread_and_unpack() {
    assert_eq!(
        eval_ok("let xs = [2, 3]; [1, ...xs, 4]"),
        Value::list(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4)
        ])
    );
    assert_eq!(
        eval_ok("func add(a, b, c) { a + b + c }; let xs = [1, 2, 3]; add(...xs)"),
        Value::Int(6)
    );
    assert_eq!(
        eval_ok("let base = {a: 1}; let m = {...base, b: 2}; m.a + m.b"),
        Value::Int(3)
    );
}

#[test]
fn test_pipe_and_partial() {
    assert_eq!(
        eval_ok("func double(x) { x * 2 }; 21 |> double"),
        Value::Int(42)
    );
    assert_eq!(
        eval_ok("func add(a, b) { a + b }; 2 |> add(40)"),
        Value::Int(42)
    );
    assert_eq!(
        eval_ok("func inc(x) { x + 1 }; func double(x) { x * 2 }; 10 |> inc |> double"),
        Value::Int(22)
    );
}

#[test]
fn test_list_methods_through_vm() {
    assert_eq!(
        eval_ok("[3, 1, 2].sort()"),
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert_eq!(
        eval_ok("func double(x) { x * 2 }; [1, 2].map(double)"),
        Value::list(vec![Value::Int(2), Value::Int(4)])
    );
    assert_eq!(
        eval_ok("func odd(x) { x % 2 == 1 }; [1, 2, 3].filter(odd)"),
        Value::list(vec![Value::Int(1), Value::Int(3)])
    );
    assert_eq!(
        eval_ok("func add(a, b) { a + b }; [1, 2, 3].reduce(add, 10)"),
        Value::Int(16)
    );
}

#[test]
fn test_try_catch_finally_ordering() {
    let source = "
        let log = []
        try {
            log.append(\"a\")
            throw \"boom\"
        } catch e {
            log.append(\"b\")
        } finally {
            log.append(\"c\")
        }
        log
    ";
    assert_eq!(
        eval_ok(source),
        Value::list(vec![
            Value::string("a"),
            Value::string("b"),
            Value::string("c")
        ])
    );
}

#[test]
fn test_catch_binds_error_value() {
    let source = "
        let kind = nil
        let message = nil
        try {
            [1][5]
        } catch e {
            kind = e.kind
            message = e.message
        }
        [kind, message]
    ";
    assert_eq!(
        eval_ok(source),
        Value::list(vec![
            Value::string("index"),
            Value::string("list index out of range: 5")
        ])
    );
}

#[test]
fn test_finally_runs_without_exception() {
    let source = "
        let log = []
        try { log.append(1) } finally { log.append(2) }
        log
    ";
    assert_eq!(
        eval_ok(source),
        Value::list(vec![Value::Int(1), Value::Int(2)])
    );
}

#[test]
fn test_finally_runs_on_uncaught_throw() {
    let source = "
        let log = []
        func risky(log) {
            try { throw \"boom\" } finally { log.append(\"cleanup\") }
        }
        risky(log)
    ";
    let err = eval(source).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert_eq!(err.message(), "boom");
}

#[test]
fn test_return_through_finally() {
    let source = "
        let log = []
        func f(log) {
            try {
                return 1
            } finally {
                log.append(\"ran\")
            }
        }
        let result = f(log)
        [result, log[0]]
    ";
    assert_eq!(
        eval_ok(source),
        Value::list(vec![Value::Int(1), Value::string("ran")])
    );
}

#[test]
fn test_nested_finally_on_return() {
    let source = "
        let log = []
        func f(log) {
            try {
                try {
                    return \"inner\"
                } finally {
                    log.append(1)
                }
            } finally {
                log.append(2)
            }
        }
        let r = f(log)
        [r, log]
    ";
    assert_eq!(
        eval_ok(source),
        Value::list(vec![
            Value::string("inner"),
            Value::list(vec![Value::Int(1), Value::Int(2)])
        ])
    );
}

#[test]
fn test_exception_in_catch_still_runs_finally() {
    let source = "
        let log = []
        func f(log) {
            try {
                throw \"first\"
            } catch e {
                throw \"second\"
            } finally {
                log.append(\"fin\")
            }
        }
        let seen = nil
        try { f(log) } catch e { seen = e.message }
        [seen, log[0]]
    ";
    assert_eq!(
        eval_ok(source),
        Value::list(vec![Value::string("second"), Value::string("fin")])
    );
}

#[test]
fn test_exception_crosses_frames() {
    let source = "
        func inner() { throw \"deep\" }
        func middle() { inner() }
        let seen = nil
        try { middle() } catch e { seen = e.message }
        seen
    ";
    assert_eq!(eval_ok(source), Value::string("deep"));
}

#[test]
fn test_caught_error_is_an_inert_value() {
    let result = eval_ok(
        "let e = nil; try { 1 / 0 } catch caught { e = caught }; e.message",
    );
    assert_eq!(result, Value::string("division by zero"));
}

#[test]
fn test_division_by_zero_has_location_and_stack() {
    let err = eval("func f() { 1 / 0 }\nf()").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Value);
    let location = err.location().expect("location attached");
    assert_eq!(location.line, 1);
    assert!(err.has_stack());
    assert_eq!(err.stack()[0].function, "f");
    assert_eq!(err.stack().last().unwrap().function, "<main>");
}

#[test]
fn test_native_functions_and_reentrancy() {
    let mut compiler = Compiler::new(None);
    let table = compiler.symbol_table();
    let host_sum = table.define("host_sum", false).unwrap();
    let apply_twice = table.define("apply_twice", false).unwrap();

    let mut machine = Machine::new(Context::background());
    machine.set_global(
        host_sum.index as usize,
        Value::Native(Arc::new(NativeFunction::new("host_sum", |_cx, args| {
            require_args("host_sum", args, 2)?;
            Ok(Value::Int(args[0].as_int()? + args[1].as_int()?))
        }))),
    );
    // A native that re-enters the machine to call a script closure.
    machine.set_global(
        apply_twice.index as usize,
        Value::Native(Arc::new(NativeFunction::new("apply_twice", |cx, args| {
            require_args("apply_twice", args, 2)?;
            let once = cx.call(&args[0], vec![args[1].clone()])?;
            cx.call(&args[0], vec![once])
        }))),
    );

    let code = compiler
        .compile_program(&parse("host_sum(40, 2)").unwrap())
        .unwrap();
    assert_eq!(machine.run(code).unwrap(), Value::Int(42));

    let code = compiler
        .compile_program(&parse("func inc(x) { x + 1 }; apply_twice(inc, 40)").unwrap())
        .unwrap();
    assert_eq!(machine.run(code).unwrap(), Value::Int(42));
}

#[test]
fn test_native_arity_error_shape() {
    let mut compiler = Compiler::new(None);
    let symbol = compiler.symbol_table().define("fn", false).unwrap();
    let mut machine = Machine::new(Context::background());
    machine.set_global(
        symbol.index as usize,
        Value::Native(Arc::new(NativeFunction::new("fn", |_cx, args| {
            require_args("fn", args, 2)?;
            Ok(Value::Nil)
        }))),
    );
    let code = compiler.compile_program(&parse("fn(1)").unwrap()).unwrap();
    let err = machine.run(code).unwrap_err();
    assert_eq!(err.to_string(), "args: fn: expected 2 arguments, got 1");
}

#[test]
fn test_cancellation_through_finally() {
    let mut compiler = Compiler::new(None);
    let symbol = compiler.symbol_table().define("log", false).unwrap();

    let context = Context::with_timeout(Duration::from_millis(50));
    let mut machine = Machine::new(context);
    let log = Value::list(vec![]);
    machine.set_global(symbol.index as usize, log.clone());

    let source = "
        try {
            for { }
        } finally {
            log.append(\"cleanup\")
        }
    ";
    let code = compiler
        .compile_program(&parse(source).unwrap())
        .unwrap();
    let err = machine.run(code).unwrap_err();
    assert_eq!(err.to_string(), "runtime: interrupted");
    assert_eq!(log, Value::list(vec![Value::string("cleanup")]));
}

#[test]
fn test_cancel_before_run() {
    let context = Context::background();
    context.cancel();
    let code = Compiler::new(None)
        .compile_program(&parse("let x = 0; for x < 100 { x += 1 }; x").unwrap())
        .unwrap();
    let err = Machine::new(context).run(code).unwrap_err();
    assert_eq!(err.message(), "interrupted");
}

#[test]
fn test_call_value_from_host() {
    let mut compiler = Compiler::new(None);
    let code = compiler
        .compile_program(&parse("func add(a, b=1) { a + b }; add").unwrap())
        .unwrap();
    let mut machine = Machine::new(Context::background());
    let callable = machine.run(code).unwrap();
    assert!(callable.is_callable());

    let result = machine
        .call_value(&callable, vec![Value::Int(41)])
        .unwrap();
    assert_eq!(result, Value::Int(42));

    let err = machine.call_value(&Value::Int(3), vec![]).unwrap_err();
    assert_eq!(err.to_string(), "type: int is not callable");
}

#[test]
fn test_deterministic_across_machines() {
    let code = Compiler::new(None)
        .compile_program(
            &parse("let acc = []; for x in [3, 1, 2] { acc.append(x * x) }; acc").unwrap(),
        )
        .unwrap();
    let a = Machine::new(Context::background()).run(Arc::clone(&code)).unwrap();
    let b = Machine::new(Context::background()).run(code).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_call_depth_limit() {
    let limits = Limits {
        max_call_depth: 32,
        ..Limits::default()
    };
    let code = Compiler::new(None)
        .compile_program(&parse("func f(n) { f(n + 1) }; f(0)").unwrap())
        .unwrap();
    let err = Machine::with_limits(Context::background(), limits)
        .run(code)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert!(err.message().contains("max call depth"));
}

#[test]
fn test_rethrow_preserves_trace() {
    let source = "
        func thrower() { throw \"original\" }
        let seen = nil
        try {
            try { thrower() } catch e { throw e }
        } catch outer {
            seen = outer
        }
        seen
    ";
    let result = eval_ok(source);
    match result {
        Value::Error(err) => {
            assert_eq!(err.message(), "original");
            assert!(err.has_stack());
            assert_eq!(err.stack()[0].function, "thrower");
        }
        other => panic!("expected error value, got {other:?}"),
    }
}
