#![allow(dead_code)]

#[derive(Clone, calmform::form::FormModel)]
struct TupleForm(String);

fn main() {}
