use crate::types::FuncType;

#[test]
fn test_scalar_display() {
    assert_eq!(FuncType::Int.to_string(), "int");
    assert_eq!(FuncType::Cell.to_string(), "cell");
    assert_eq!(FuncType::Slice.to_string(), "slice");
    assert_eq!(FuncType::Builder.to_string(), "builder");
    assert_eq!(FuncType::Hole.to_string(), "_");
}

#[test]
fn test_compound_display() {
    let ty = FuncType::Tensor(vec![
        FuncType::Int,
        FuncType::Tensor(vec![FuncType::Slice, FuncType::Cell]),
        FuncType::tuple(),
    ]);
    assert_eq!(ty.to_string(), "(int, (slice, cell), tuple)");
    assert_eq!(FuncType::unit().to_string(), "()");
    assert_eq!(
        FuncType::Tuple(vec![FuncType::Int, FuncType::Int]).to_string(),
        "[int, int]"
    );
}

#[test]
fn test_stack_width_flattens_tensors() {
    let ty = FuncType::Tensor(vec![
        FuncType::Int,
        FuncType::Tensor(vec![FuncType::Slice, FuncType::Cell]),
        FuncType::tuple(),
    ]);
    assert_eq!(ty.stack_width(), 4);
    assert_eq!(FuncType::unit().stack_width(), 0);
    assert!(FuncType::unit().is_unit());
}
