#![allow(dead_code)]

#[derive(Clone, calmform::form::FormModel)]
enum ContactChoice {
    Email(String),
    Phone(String),
}

fn main() {}
