use indoc::indoc;

use crate::test_utils::compile;

use super::generate_asm;

#[test]
fn public_function_gets_globl_and_prologue() {
    let compilation = compile("public int id(int x) { return x; }");
    let asm = generate_asm(&compilation.cx);

    assert!(asm.contains(".globl id") || asm.contains(".globl _id"));
    assert!(asm.contains("pushl %ebp"));
    assert!(asm.contains("movl %esp, %ebp"));
    assert!(asm.contains("leave"));
    assert!(asm.contains("ret"));
}

#[test]
fn identity_function_assembly() {
    let compilation = compile("public int id(int x) { return x; }");
    let asm = generate_asm(&compilation.cx);
    insta::assert_snapshot!(asm, @r#"
        .file "<test>"
        .text

    #0 enter
    .globl id
    id:
        pushl %ebp
        movl %esp, %ebp
        pushl %ebx
        subl $0, %esp
        movl 8(%ebp), %eax
    #2 return x
        movl %eax, %eax
    #1 exit
        popl %ebx
        leave
        ret

        .section .rodata
    "#);
}

#[test]
fn comparison_tests_emit_cmp_and_conditional_jump() {
    let compilation = compile(indoc! {"
        public int max(int a, int b) {
            if (a > b) return a;
            else return b;
        }
    "});
    let asm = generate_asm(&compilation.cx);

    assert!(asm.contains("cmpl"));
    // One arm is reached by a conditional jump, negated or not.
    assert!(asm.contains("jg ") || asm.contains("jle "));
}

#[test]
fn division_uses_sign_extension() {
    let compilation = compile("public int halve(int a) { return a / 2; }");
    let asm = generate_asm(&compilation.cx);
    assert!(asm.contains("cltd"));
    assert!(asm.contains("idivl"));
}

#[test]
fn calls_push_arguments_and_store_the_result() {
    let compilation = compile(indoc! {"
        int helper(int a, int b);

        public int f(int x) {
            return helper(x, 2);
        }
    "});
    let asm = generate_asm(&compilation.cx);

    assert!(asm.contains("pushl %eax"));
    assert!(asm.contains("call helper") || asm.contains("call _helper"));
}

#[test]
fn string_literals_pool_into_rodata() {
    let compilation = compile(indoc! {"
        int print(int s);

        public int f(int x) {
            print(\"hello\");
            return x;
        }
    "});
    let asm = generate_asm(&compilation.cx);

    assert!(asm.contains(".section .rodata"));
    assert!(asm.contains(".LC0:"));
    assert!(asm.contains(".string \"hello\""));
}

#[test]
fn private_unused_functions_are_not_emitted() {
    let compilation = compile(indoc! {"
        int never_called(int x) { return x; }

        public int f(int x) { return x; }
    "});
    let asm = generate_asm(&compilation.cx);

    assert!(!asm.contains("never_called:"));
}
