#![allow(dead_code)]

#[derive(Clone, calmform::form::FormModel)]
struct GenericForm<T> {
    value: T,
}

fn main() {}
