use super::fixtures::{self, ADD, SUB};
use super::vm::{Fault, Val, Vm};
use crate::exit_codes;
use crate::naming;
use cellgen_model::ast::{Expr, Stmt};
use cellgen_model::types::{
    MessageSelector, ReceiverDescription, ReceiverSelector, TypeRef, TypeTable,
};
use cellgen_model::Cell;
use pretty_assertions::assert_eq;

fn deployed<'m>(output: &'m crate::EmissionOutput, contract: &str) -> Vm<'m> {
    let mut vm = Vm::new(output);
    vm.deploy(contract, vec![]).unwrap();
    vm
}

fn state(vm: &mut Vm<'_>) -> (Val, Val) {
    (
        vm.get("value", vec![]).unwrap(),
        vm.get("last", vec![]).unwrap(),
    )
}

fn send(vm: &mut Vm<'_>, body: Cell) -> Result<(), Fault> {
    vm.recv_internal(&fixtures::sender(), 1_000_000, body, false)
}

#[test]
fn test_binary_messages_dispatch_by_opcode() {
    let output = fixtures::contract(fixtures::counter_table(), "Counter");
    let mut vm = deployed(&output, "Counter");

    send(&mut vm, fixtures::binary_body(ADD, 5)).unwrap();
    assert_eq!(state(&mut vm), (Val::int(5), Val::int(1)));

    send(&mut vm, fixtures::binary_body(SUB, 2)).unwrap();
    assert_eq!(state(&mut vm), (Val::int(3), Val::int(7)));

    send(&mut vm, fixtures::binary_body(ADD, 10)).unwrap();
    assert_eq!(state(&mut vm), (Val::int(13), Val::int(1)));
}

#[test]
fn test_unmatched_opcode_reaches_fallback() {
    let output = fixtures::contract(fixtures::counter_table(), "Counter");
    let mut vm = deployed(&output, "Counter");

    send(&mut vm, fixtures::opcode_only(0x0000_0002)).unwrap();
    assert_eq!(state(&mut vm), (Val::int(0), Val::int(5)));
}

#[test]
fn test_truncated_binary_body_fails_to_parse() {
    let output = fixtures::contract(fixtures::counter_table(), "Counter");
    let mut vm = deployed(&output, "Counter");

    assert_eq!(send(&mut vm, fixtures::opcode_only(ADD)), Err(Fault::Exit(9)));
}

#[test]
fn test_empty_body_and_zero_opcode_are_empty_messages() {
    let output = fixtures::contract(fixtures::counter_table(), "Counter");
    let mut vm = deployed(&output, "Counter");

    send(&mut vm, Cell::empty()).unwrap();
    assert_eq!(state(&mut vm).1, Val::int(2));

    send(&mut vm, fixtures::binary_body(ADD, 1)).unwrap();
    assert_eq!(state(&mut vm).1, Val::int(1));
    send(&mut vm, fixtures::opcode_only(0)).unwrap();
    assert_eq!(state(&mut vm), (Val::int(1), Val::int(2)));
}

#[test]
fn test_comment_dispatch() {
    let output = fixtures::contract(fixtures::counter_table(), "Counter");
    let mut vm = deployed(&output, "Counter");

    send(&mut vm, fixtures::text_body("increment")).unwrap();
    assert_eq!(state(&mut vm), (Val::int(1), Val::int(3)));

    send(&mut vm, fixtures::text_body("decrement")).unwrap();
    assert_eq!(state(&mut vm), (Val::int(1), Val::int(4)));

    // A short body with a non-zero head is not text.
    send(&mut vm, fixtures::opcode_only(0x7FFF_FFFF)).unwrap();
    assert_eq!(state(&mut vm).1, Val::int(5));
}

#[test]
fn test_typed_bounce_uses_truncated_view() {
    let output = fixtures::contract(fixtures::counter_table(), "Counter");
    let mut vm = deployed(&output, "Counter");

    let bounced = fixtures::bounced_body(&fixtures::binary_body(ADD, 5));
    vm.recv_internal(&fixtures::sender(), 0, bounced, true)
        .unwrap();
    assert_eq!(state(&mut vm), (Val::int(0), Val::int(6)));
}

#[test]
fn test_unhandled_bounce_is_accepted() {
    let output = fixtures::contract(fixtures::counter_table(), "Counter");
    let mut vm = deployed(&output, "Counter");

    let bounced = fixtures::bounced_body(&fixtures::binary_body(SUB, 5));
    vm.recv_internal(&fixtures::sender(), 0, bounced, true)
        .unwrap();
    assert_eq!(state(&mut vm), (Val::int(0), Val::int(0)));
}

#[test]
fn test_unknown_message_without_fallback_is_rejected() {
    let output = fixtures::contract(fixtures::strict_table(), "Strict");
    let mut vm = deployed(&output, "Strict");

    send(&mut vm, fixtures::binary_body(ADD, 3)).unwrap();
    assert_eq!(state(&mut vm), (Val::int(3), Val::int(1)));

    assert_eq!(
        send(&mut vm, fixtures::opcode_only(0x0000_0002)),
        Err(Fault::Exit(exit_codes::INVALID_MESSAGE))
    );
    assert_eq!(
        send(&mut vm, fixtures::text_body("increment")),
        Err(Fault::Exit(exit_codes::INVALID_MESSAGE))
    );
    assert_eq!(
        send(&mut vm, Cell::empty()),
        Err(Fault::Exit(exit_codes::INVALID_MESSAGE))
    );

    // The failed messages left no trace.
    assert_eq!(state(&mut vm), (Val::int(3), Val::int(1)));
}

#[test]
fn test_external_router() {
    let output = fixtures::contract(fixtures::counter_table(), "Counter");
    let mut vm = deployed(&output, "Counter");

    vm.recv_external(fixtures::binary_body(ADD, 4)).unwrap();
    assert_eq!(state(&mut vm), (Val::int(4), Val::int(8)));
    assert_eq!(
        vm.recv_external(fixtures::binary_body(SUB, 1)),
        Err(Fault::Exit(exit_codes::INVALID_MESSAGE))
    );
}

#[test]
fn test_external_entrypoint_only_when_needed() {
    let counter = fixtures::contract(fixtures::counter_table(), "Counter");
    assert!(counter.function(naming::RECV_EXTERNAL).is_some());
    assert!(counter.function(&naming::router_external("Counter")).is_some());

    let strict = fixtures::contract(fixtures::strict_table(), "Strict");
    assert!(strict.function(naming::RECV_INTERNAL).is_some());
    assert!(strict.function(naming::RECV_EXTERNAL).is_none());
    assert!(strict.function(&naming::router_external("Strict")).is_none());
}

#[test]
fn test_sender_is_published_to_context() {
    let output = fixtures::contract(fixtures::counter_table(), "Counter");
    let mut vm = deployed(&output, "Counter");

    send(&mut vm, Cell::empty()).unwrap();
    let sender = vm.global(crate::runtime::CONTEXT_SENDER).cloned();
    match sender {
        Some(Val::Slice(slice)) => {
            assert_eq!(
                slice.remaining_bit_values(),
                fixtures::sender().to_cell().unwrap().bits()
            );
        }
        other => panic!("sender not recorded: {:?}", other),
    }
}

/// The counter without a comment fallback and with a bounce fallback recording marker 9.
fn catch_all_table() -> TypeTable {
    let mut table = fixtures::counter_table();
    if let Some(counter) = table.types.get_mut("Counter") {
        counter.receivers.retain(|r| {
            r.selector
                != ReceiverSelector::Internal {
                    selector: MessageSelector::CommentFallback,
                }
        });
        let last = Expr::field(
            Expr::id("self", TypeRef::named("Counter")),
            "last",
            fixtures::int(),
        );
        counter.receivers.push(ReceiverDescription::new(
            ReceiverSelector::BounceFallback,
            Some("msg"),
            vec![Stmt::assign(last, Expr::number(9))],
        ));
    }
    table
}

#[test]
fn test_untyped_bounce_reaches_bounce_fallback() {
    let output = fixtures::contract(catch_all_table(), "Counter");
    let mut vm = deployed(&output, "Counter");

    let bounced = fixtures::bounced_body(&fixtures::binary_body(SUB, 5));
    vm.recv_internal(&fixtures::sender(), 0, bounced, true)
        .unwrap();
    assert_eq!(state(&mut vm), (Val::int(0), Val::int(9)));

    // A typed bounce handler still wins over the fallback.
    let bounced = fixtures::bounced_body(&fixtures::binary_body(ADD, 5));
    vm.recv_internal(&fixtures::sender(), 0, bounced, true)
        .unwrap();
    assert_eq!(state(&mut vm).1, Val::int(6));
}

#[test]
fn test_unmatched_comment_without_comment_fallback_reaches_fallback() {
    let output = fixtures::contract(catch_all_table(), "Counter");
    let mut vm = deployed(&output, "Counter");

    send(&mut vm, fixtures::text_body("other")).unwrap();
    assert_eq!(state(&mut vm), (Val::int(0), Val::int(5)));

    send(&mut vm, fixtures::text_body("increment")).unwrap();
    assert_eq!(state(&mut vm), (Val::int(1), Val::int(3)));
}
