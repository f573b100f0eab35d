//! Integration tests for the Lama bytecode interpreter.
//!
//! Programs are assembled by hand into byte vectors and executed over
//! an in-memory heap with buffered input/output, so every test runs
//! hermetically.

use std::io::Cursor;

use lama_bytefile::Bytefile;
use lama_common::Word;
use lama_vm::{Heap, Interpreter, VmError};

// ============================================================
// Helper functions
// ============================================================

type TestHeap = Heap<Cursor<Vec<u8>>, Vec<u8>>;

/// Words occupied by the sentinel frame of a fresh call stack.
const SENTINEL_WORDS: usize = 2;

const CONST: u8 = 0x10;
const STRING: u8 = 0x11;
const SEXP: u8 = 0x12;
const STA: u8 = 0x14;
const JMP: u8 = 0x15;
const END: u8 = 0x16;
const DROP: u8 = 0x18;
const DUP: u8 = 0x19;
const ELEM: u8 = 0x1B;
const LD_G: u8 = 0x20;
const LD_A: u8 = 0x22;
const LD_C: u8 = 0x23;
const LDA_G: u8 = 0x30;
const ST_G: u8 = 0x40;
const CJMP_Z: u8 = 0x50;
const CJMP_NZ: u8 = 0x51;
const BEGIN: u8 = 0x52;
const CLOSURE: u8 = 0x54;
const CALLC: u8 = 0x55;
const CALL: u8 = 0x56;
const TAG: u8 = 0x57;
const ARRAY: u8 = 0x58;
const FAIL: u8 = 0x59;
const LINE: u8 = 0x5A;
const PATT_STR_EQ: u8 = 0x60;
const PATT_IS_STRING: u8 = 0x61;
const PATT_IS_SEXP: u8 = 0x63;
const PATT_IS_REF: u8 = 0x64;
const PATT_IS_VAL: u8 = 0x65;
const LREAD: u8 = 0x70;
const LWRITE: u8 = 0x71;
const LLENGTH: u8 = 0x72;
const LSTRING: u8 = 0x73;
const BARRAY: u8 = 0x74;
const STOP: u8 = 0xF0;

fn op(code: &mut Vec<u8>, byte: u8) {
    code.push(byte);
}

fn operand(code: &mut Vec<u8>, value: i32) {
    code.extend_from_slice(&value.to_le_bytes());
}

/// Opcode followed by one 4-byte operand.
fn op1(code: &mut Vec<u8>, byte: u8, a: i32) {
    op(code, byte);
    operand(code, a);
}

/// Opcode followed by two 4-byte operands.
fn op2(code: &mut Vec<u8>, byte: u8, a: i32, b: i32) {
    op(code, byte);
    operand(code, a);
    operand(code, b);
}

fn image(code: Vec<u8>) -> Bytefile {
    Bytefile::from_parts(code, Vec::new(), Vec::new(), 4)
}

fn image_with_strings(code: Vec<u8>, strings: &[u8]) -> Bytefile {
    Bytefile::from_parts(code, strings.to_vec(), Vec::new(), 4)
}

fn heap() -> TestHeap {
    Heap::new(Cursor::new(Vec::new()), Vec::new())
}

fn heap_with_input(input: &str) -> TestHeap {
    Heap::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
}

/// Run to a normal halt and return the interpreter for inspection.
fn run_ok(bf: &Bytefile) -> Interpreter<'_, TestHeap> {
    let mut interp = Interpreter::new(bf, heap());
    interp.run().expect("program should halt normally");
    interp
}

/// Run to the expected fatal error.
fn run_err(bf: &Bytefile) -> VmError {
    let mut interp = Interpreter::new(bf, heap());
    interp.run().expect_err("program should fail")
}

/// Run with the given input and collect everything written.
fn run_output(bf: &Bytefile, input: &str) -> String {
    let mut interp = Interpreter::new(bf, heap_with_input(input));
    interp.run().expect("program should halt normally");
    String::from_utf8(interp.into_runtime().into_output()).expect("output should be utf-8")
}

fn top(interp: &Interpreter<'_, TestHeap>) -> Word {
    interp.stack().nth(0).expect("stack should not be empty")
}

// ============================================================
// Arithmetic and stack shuffling
// ============================================================

#[test]
fn const_const_binop_leaves_one_boxed_sum() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 5);
    op1(&mut code, CONST, 7);
    op(&mut code, 0x01); // BINOP +
    op(&mut code, STOP);

    let bf = image(code);
    let interp = run_ok(&bf);
    assert_eq!(top(&interp), Word::int(12));
    // Exactly one new word beyond the sentinel frame.
    assert_eq!(interp.stack().len(), SENTINEL_WORDS + 1);
}

#[test]
fn binop_code_table() {
    // (code, lhs, rhs, expected)
    let cases = [
        (0x01, 9, 4, 13),  // +
        (0x02, 9, 4, 5),   // -
        (0x03, 9, 4, 36),  // *
        (0x04, 9, 4, 2),   // /
        (0x05, 9, 4, 1),   // %
        (0x06, 9, 4, 0),   // <
        (0x07, 4, 4, 1),   // <=
        (0x08, 9, 4, 1),   // >
        (0x09, 3, 4, 0),   // >=
        (0x0A, 4, 4, 1),   // ==
        (0x0B, 4, 4, 0),   // !=
        (0x0C, 2, 0, 0),   // &&
        (0x0D, 2, 0, 1),   // !!
    ];
    for (byte, lhs, rhs, expected) in cases {
        let mut code = Vec::new();
        op1(&mut code, CONST, lhs);
        op1(&mut code, CONST, rhs);
        op(&mut code, byte);
        op(&mut code, STOP);

        let bf = image(code);
        let interp = run_ok(&bf);
        assert_eq!(
            top(&interp),
            Word::int(expected),
            "wrong result for binop {byte:#04x}"
        );
    }
}

#[test]
fn division_by_zero_is_fatal() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 1);
    op1(&mut code, CONST, 0);
    op(&mut code, 0x04); // BINOP /
    op(&mut code, STOP);

    let bf = image(code);
    assert!(matches!(run_err(&bf), VmError::DivisionByZero { .. }));
}

#[test]
fn negative_constants_survive_the_tag() {
    let mut code = Vec::new();
    op1(&mut code, CONST, -13);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(-13));
}

#[test]
fn dup_duplicates_top() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 3);
    op(&mut code, DUP);
    op(&mut code, 0x03); // BINOP *
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(9));
}

#[test]
fn drop_discards_top() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 1);
    op1(&mut code, CONST, 2);
    op(&mut code, DROP);
    op(&mut code, STOP);

    let bf = image(code);
    let interp = run_ok(&bf);
    assert_eq!(top(&interp), Word::int(1));
    assert_eq!(interp.stack().len(), SENTINEL_WORDS + 1);
}

// ============================================================
// Control flow
// ============================================================

#[test]
fn jmp_skips_garbage_bytes() {
    let mut code = Vec::new();
    op1(&mut code, JMP, 6); // jump over one unused byte
    op(&mut code, 0x80); // family 8, invalid if ever executed
    op1(&mut code, CONST, 1);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(1));
}

#[test]
fn cjmpz_taken_on_zero() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 0);
    op1(&mut code, CJMP_Z, 15); // over the CONST 111
    op1(&mut code, CONST, 111);
    op1(&mut code, CONST, 222); // offset 15
    op(&mut code, STOP);

    let bf = image(code);
    let interp = run_ok(&bf);
    assert_eq!(top(&interp), Word::int(222));
    assert_eq!(interp.stack().len(), SENTINEL_WORDS + 1);
}

#[test]
fn cjmpz_not_taken_on_nonzero() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 5);
    op1(&mut code, CJMP_Z, 15);
    op1(&mut code, CONST, 111);
    op1(&mut code, CONST, 222);
    op(&mut code, STOP);

    let bf = image(code);
    // Both constants pushed, 222 on top of 111.
    let interp = run_ok(&bf);
    assert_eq!(top(&interp), Word::int(222));
    assert_eq!(interp.stack().len(), SENTINEL_WORDS + 2);
}

#[test]
fn cjmpnz_taken_on_nonzero() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 5);
    op1(&mut code, CJMP_NZ, 15);
    op1(&mut code, CONST, 111);
    op1(&mut code, CONST, 222);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(222));
}

#[test]
fn line_is_a_noop() {
    let mut code = Vec::new();
    op1(&mut code, LINE, 42);
    op1(&mut code, CONST, 1);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(1));
}

#[test]
fn fail_carries_source_position() {
    let mut code = Vec::new();
    op2(&mut code, FAIL, 7, 9);

    let bf = image(code);
    assert!(matches!(
        run_err(&bf),
        VmError::ExplicitFail { line: 7, column: 9 }
    ));
}

// ============================================================
// Calls and frames
// ============================================================

#[test]
fn call_returns_first_argument_and_consumes_all() {
    // f(a, b) = a
    let mut code = Vec::new();
    op1(&mut code, JMP, 20);
    op2(&mut code, BEGIN, 2, 0); // offset 5
    op1(&mut code, LD_A, 0); // offset 14
    op(&mut code, END); // offset 19
    op1(&mut code, CONST, 10); // main, offset 20
    op1(&mut code, CONST, 20);
    op2(&mut code, CALL, 5, 2);
    op(&mut code, STOP);

    let bf = image(code);
    let interp = run_ok(&bf);
    // Both argument words removed, the first argument on top.
    assert_eq!(top(&interp), Word::int(10));
    assert_eq!(interp.stack().len(), SENTINEL_WORDS + 1);
}

#[test]
fn recursive_sum_over_managed_stack() {
    // sum(n) = if n == 0 then 0 else n + sum(n - 1)
    let mut code = Vec::new();
    op1(&mut code, JMP, 57);
    op2(&mut code, BEGIN, 1, 0); // sum, offset 5
    op1(&mut code, LD_A, 0); // offset 14
    op1(&mut code, CJMP_NZ, 30); // offset 19
    op1(&mut code, CONST, 0); // offset 24
    op(&mut code, END); // offset 29
    op1(&mut code, LD_A, 0); // offset 30
    op1(&mut code, CONST, 1); // offset 35
    op(&mut code, 0x02); // BINOP -, offset 40
    op2(&mut code, CALL, 5, 1); // offset 41
    op1(&mut code, LD_A, 0); // offset 50
    op(&mut code, 0x01); // BINOP +, offset 55
    op(&mut code, END); // offset 56
    op1(&mut code, CONST, 5); // main, offset 57
    op2(&mut code, CALL, 5, 1); // offset 62
    op(&mut code, LWRITE); // offset 71
    op(&mut code, DROP);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(run_output(&bf, ""), "15\n");
}

#[test]
fn end_with_no_caller_halts() {
    let mut code = Vec::new();
    op2(&mut code, BEGIN, 0, 0);
    op1(&mut code, CONST, 3);
    op(&mut code, END); // sentinel frame: no caller, clean halt

    let bf = image(code);
    let interp = run_ok(&bf);
    // The sentinel frame is gone; nothing is addressable any more.
    assert!(interp.stack().nth(0).is_err());
}

#[test]
fn deep_recursion_overflows_configured_capacity() {
    // f() = f(), no base case: the frame records alone must overflow.
    let mut code = Vec::new();
    op2(&mut code, CALL, 0, 0);

    let bf = image(code);
    let mut interp = Interpreter::with_stack_capacity(&bf, heap(), 64);
    let err = interp.run().expect_err("unbounded recursion must overflow");
    assert!(matches!(err, VmError::StackOverflow { capacity: 64 }));
}

#[test]
fn locals_are_boxed_zero_on_entry() {
    let mut code = Vec::new();
    op2(&mut code, BEGIN, 0, 2);
    op(&mut code, 0x21); // LD L(0)
    operand(&mut code, 0);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(0));
}

#[test]
fn store_local_is_an_expression() {
    let mut code = Vec::new();
    op2(&mut code, BEGIN, 0, 1);
    op1(&mut code, CONST, 8);
    op(&mut code, 0x41); // ST L(0)
    operand(&mut code, 0);
    op(&mut code, DROP);
    op(&mut code, 0x21); // LD L(0)
    operand(&mut code, 0);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(8));
}

// ============================================================
// Globals
// ============================================================

#[test]
fn globals_start_as_boxed_zero() {
    let mut code = Vec::new();
    op1(&mut code, LD_G, 0);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(0));
}

#[test]
fn global_store_load_roundtrip() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 17);
    op1(&mut code, ST_G, 2);
    op(&mut code, DROP);
    op1(&mut code, LD_G, 2);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(17));
}

#[test]
fn global_slot_out_of_range_is_fatal() {
    let mut code = Vec::new();
    op1(&mut code, LD_G, 99);
    op(&mut code, STOP);

    let bf = image(code);
    assert!(matches!(
        run_err(&bf),
        VmError::GlobalOutOfRange { index: 99, size: 4 }
    ));
}

// ============================================================
// Heap objects: strings, arrays, sexps
// ============================================================

#[test]
fn string_alloc_and_length() {
    let mut code = Vec::new();
    op1(&mut code, STRING, 0);
    op(&mut code, LLENGTH);
    op(&mut code, STOP);

    let bf = image_with_strings(code, b"hello\0");
    assert_eq!(top(&run_ok(&bf)), Word::int(5));
}

#[test]
fn elem_on_string_yields_boxed_byte() {
    let mut code = Vec::new();
    op1(&mut code, STRING, 0);
    op1(&mut code, CONST, 1);
    op(&mut code, ELEM);
    op(&mut code, STOP);

    let bf = image_with_strings(code, b"hi\0");
    assert_eq!(top(&run_ok(&bf)), Word::int(b'i' as i32));
}

#[test]
fn barray_builds_in_natural_order() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 10);
    op1(&mut code, CONST, 20);
    op1(&mut code, CONST, 30);
    op1(&mut code, BARRAY, 3);
    op1(&mut code, CONST, 0);
    op(&mut code, ELEM);
    op(&mut code, STOP);

    let bf = image(code);
    // Element 0 is the first value pushed.
    assert_eq!(top(&run_ok(&bf)), Word::int(10));
}

#[test]
fn array_opcode_checks_shape_and_length() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 1);
    op1(&mut code, CONST, 2);
    op1(&mut code, BARRAY, 2);
    op1(&mut code, ARRAY, 2);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(1));

    let mut code = Vec::new();
    op1(&mut code, CONST, 1);
    op1(&mut code, CONST, 2);
    op1(&mut code, BARRAY, 2);
    op1(&mut code, ARRAY, 3); // wrong length
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(0));
}

#[test]
fn sexp_matches_its_own_tag() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 1);
    op1(&mut code, CONST, 2);
    op2(&mut code, SEXP, 0, 2); // `Cons (1, 2)
    op2(&mut code, TAG, 0, 2);
    op(&mut code, STOP);

    let bf = image_with_strings(code, b"Cons\0");
    assert_eq!(top(&run_ok(&bf)), Word::int(1));
}

#[test]
fn tag_rejects_wrong_arity_and_integers() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 1);
    op2(&mut code, SEXP, 0, 1);
    op2(&mut code, TAG, 0, 2); // arity mismatch
    op(&mut code, STOP);

    let bf = image_with_strings(code, b"Cons\0");
    assert_eq!(top(&run_ok(&bf)), Word::int(0));

    let mut code = Vec::new();
    op1(&mut code, CONST, 5);
    op2(&mut code, TAG, 0, 0); // plain integer is no structure
    op(&mut code, STOP);

    let bf = image_with_strings(code, b"Cons\0");
    assert_eq!(top(&run_ok(&bf)), Word::int(0));
}

#[test]
fn sexp_elements_keep_natural_order() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 10);
    op1(&mut code, CONST, 20);
    op2(&mut code, SEXP, 0, 2);
    op1(&mut code, CONST, 0);
    op(&mut code, ELEM);
    op(&mut code, STOP);

    let bf = image_with_strings(code, b"Pair\0");
    assert_eq!(top(&run_ok(&bf)), Word::int(10));
}

// ============================================================
// STA: the tag-keyed store
// ============================================================

#[test]
fn sta_with_integer_index_stores_into_container() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 1);
    op1(&mut code, CONST, 2);
    op1(&mut code, BARRAY, 2);
    op1(&mut code, ST_G, 0); // keep the array in a global
    op(&mut code, DROP);
    op1(&mut code, LD_G, 0); // container
    op1(&mut code, CONST, 0); // boxed index selects the 3-operand form
    op1(&mut code, CONST, 99); // value
    op(&mut code, STA);
    op(&mut code, DROP);
    op1(&mut code, LD_G, 0);
    op1(&mut code, CONST, 0);
    op(&mut code, ELEM);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(99));
}

#[test]
fn sta_pushes_the_stored_value_back() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 1);
    op1(&mut code, BARRAY, 1);
    op1(&mut code, ST_G, 0);
    op(&mut code, DROP);
    op1(&mut code, LD_G, 0);
    op1(&mut code, CONST, 0);
    op1(&mut code, CONST, 55);
    op(&mut code, STA);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(55));
}

#[test]
fn sta_through_lda_address_stores_into_variable() {
    let mut code = Vec::new();
    op1(&mut code, LDA_G, 1); // address selects the 2-operand form
    op1(&mut code, CONST, 77);
    op(&mut code, STA);
    op(&mut code, DROP);
    op1(&mut code, LD_G, 1);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(77));
}

// ============================================================
// Closures
// ============================================================

#[test]
fn closure_captures_and_callc_invokes() {
    // g = 5; f = closure(G(0)); f() = captured
    let mut code = Vec::new();
    op1(&mut code, JMP, 20);
    op2(&mut code, BEGIN, 1, 0); // f, offset 5
    op1(&mut code, LD_C, 0); // offset 14
    op(&mut code, END); // offset 19
    op1(&mut code, CONST, 5); // main, offset 20
    op1(&mut code, ST_G, 0);
    op(&mut code, DROP);
    op2(&mut code, CLOSURE, 5, 1); // offset 31
    op(&mut code, 0x00); // capture kind: global
    operand(&mut code, 0);
    op1(&mut code, CALLC, 0); // offset 45
    op(&mut code, STOP);

    let bf = image(code);
    let interp = run_ok(&bf);
    assert_eq!(top(&interp), Word::int(5));
    assert_eq!(interp.stack().len(), SENTINEL_WORDS + 1);
}

#[test]
fn callc_passes_arguments_before_the_closure_slot() {
    // f(x) = x + captured, captured = 5, called with 9
    let mut code = Vec::new();
    op1(&mut code, JMP, 26);
    op2(&mut code, BEGIN, 2, 0); // f, offset 5
    op1(&mut code, LD_A, 0); // offset 14
    op1(&mut code, LD_C, 0); // offset 19
    op(&mut code, 0x01); // BINOP +, offset 24
    op(&mut code, END); // offset 25
    op1(&mut code, CONST, 5); // main, offset 26
    op1(&mut code, ST_G, 0);
    op(&mut code, DROP);
    op2(&mut code, CLOSURE, 5, 1); // offset 37
    op(&mut code, 0x00);
    operand(&mut code, 0);
    op1(&mut code, CONST, 9); // offset 51, the one argument
    op1(&mut code, CALLC, 1); // offset 56
    op(&mut code, STOP);

    let bf = image(code);
    let interp = run_ok(&bf);
    assert_eq!(top(&interp), Word::int(14));
    // Argument and closure slot both consumed.
    assert_eq!(interp.stack().len(), SENTINEL_WORDS + 1);
}

// ============================================================
// Pattern predicates
// ============================================================

#[test]
fn patt_val_and_ref_inspect_the_tag_bit() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 5);
    op(&mut code, PATT_IS_VAL);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(top(&run_ok(&bf)), Word::int(1));

    let mut code = Vec::new();
    op1(&mut code, STRING, 0);
    op(&mut code, PATT_IS_REF);
    op(&mut code, STOP);

    let bf = image_with_strings(code, b"s\0");
    assert_eq!(top(&run_ok(&bf)), Word::int(1));
}

#[test]
fn patt_string_equality_compares_contents() {
    let mut code = Vec::new();
    op1(&mut code, STRING, 0);
    op1(&mut code, STRING, 4);
    op(&mut code, PATT_STR_EQ);
    op(&mut code, STOP);

    let bf = image_with_strings(code, b"abc\0abc\0");
    assert_eq!(top(&run_ok(&bf)), Word::int(1));

    let mut code = Vec::new();
    op1(&mut code, STRING, 0);
    op1(&mut code, STRING, 4);
    op(&mut code, PATT_STR_EQ);
    op(&mut code, STOP);

    let bf = image_with_strings(code, b"abc\0abd\0");
    assert_eq!(top(&run_ok(&bf)), Word::int(0));
}

#[test]
fn patt_shape_predicates() {
    let mut code = Vec::new();
    op1(&mut code, STRING, 0);
    op(&mut code, PATT_IS_STRING);
    op(&mut code, STOP);

    let bf = image_with_strings(code, b"s\0");
    assert_eq!(top(&run_ok(&bf)), Word::int(1));

    let mut code = Vec::new();
    op1(&mut code, CONST, 1);
    op2(&mut code, SEXP, 0, 1);
    op(&mut code, PATT_IS_SEXP);
    op(&mut code, STOP);

    let bf = image_with_strings(code, b"Some\0");
    assert_eq!(top(&run_ok(&bf)), Word::int(1));
}

// ============================================================
// Builtins: read, write, string conversion
// ============================================================

#[test]
fn read_write_roundtrip() {
    let mut code = Vec::new();
    op(&mut code, LREAD);
    op(&mut code, LWRITE);
    op(&mut code, DROP);
    op(&mut code, STOP);

    let bf = image(code);
    assert_eq!(run_output(&bf, "17\n"), "> 17\n");
}

#[test]
fn lstring_converts_integers() {
    let mut code = Vec::new();
    op1(&mut code, CONST, -7);
    op(&mut code, LSTRING);
    op(&mut code, LLENGTH);
    op(&mut code, STOP);

    let bf = image(code);
    // "-7" has two bytes.
    assert_eq!(top(&run_ok(&bf)), Word::int(2));
}

// ============================================================
// Decoding failures
// ============================================================

#[test]
fn unused_family_is_invalid_without_consuming_operands() {
    let mut code = Vec::new();
    op(&mut code, 0x83);
    operand(&mut code, 1234); // must never be read as an operand
    op(&mut code, STOP);

    let bf = image(code);
    assert!(matches!(
        run_err(&bf),
        VmError::InvalidOpcode {
            family: 8,
            low: 3,
            at: 0
        }
    ));
}

#[test]
fn retired_opcodes_fail_by_name() {
    for (byte, mnemonic) in [(0x13u8, "STI"), (0x17, "RET"), (0x1A, "SWAP")] {
        let bf = image(vec![byte]);
        match run_err(&bf) {
            VmError::UnsupportedInstruction { mnemonic: m, at: 0 } => assert_eq!(m, mnemonic),
            other => panic!("expected unsupported instruction, got {other}"),
        }
    }
}

#[test]
fn running_off_the_code_region_is_fatal() {
    // CONST with a truncated operand.
    let bf = image(vec![CONST, 0x01]);
    assert!(matches!(
        run_err(&bf),
        VmError::UnexpectedEndOfCode { .. }
    ));
}

#[test]
fn empty_code_region_is_fatal() {
    let bf = image(Vec::new());
    assert!(matches!(
        run_err(&bf),
        VmError::UnexpectedEndOfCode { at: 0 }
    ));
}

// ============================================================
// Isolation
// ============================================================

#[test]
fn two_interpreters_do_not_share_state() {
    let mut code = Vec::new();
    op1(&mut code, CONST, 17);
    op1(&mut code, ST_G, 0);
    op(&mut code, DROP);
    op(&mut code, STOP);
    let writes = image(code);

    let mut code = Vec::new();
    op1(&mut code, LD_G, 0);
    op(&mut code, STOP);
    let reads = image(code);

    let first = run_ok(&writes);
    let second = run_ok(&reads);
    assert_eq!(first.globals()[0], Word::int(17));
    // The second instance still sees a zeroed global area.
    assert_eq!(top(&second), Word::int(0));
}
