#[macro_use]
extern crate context_registry;

use context_registry::{Element, ExecutionContext, KeyRef};
use std::env;
use std::thread;

context_key!(static LOCALE: Key<Locale>);
context_key!(static REQUEST_ID: Key<RequestId>);

#[derive(Debug, Clone, PartialEq, Hash)]
struct Locale(String);

#[derive(Debug, Clone, PartialEq, Hash)]
struct RequestId(u64);

impl Element for Locale {
    fn key(&self) -> KeyRef {
        KeyRef::of(&LOCALE)
    }
}

impl Element for RequestId {
    fn key(&self) -> KeyRef {
        KeyRef::of(&REQUEST_ID)
    }
}

fn main() {
    let locale = Locale(env::var("LANG").unwrap_or_else(|_| "en_US".into()));

    ExecutionContext::scope(locale, || {
        println!("the current context is {}", ExecutionContext::current());

        ExecutionContext::scope(RequestId(1), || {
            println!("changing context to {}", ExecutionContext::current());

            let ec = ExecutionContext::capture();
            thread::spawn(move || {
                ec.run(|| {
                    println!("the context in the child thread is {}", ExecutionContext::current());
                    ExecutionContext::scope(Locale("fr_FR".into()), || {
                        println!("the new context in the child thread is {}", ExecutionContext::current());
                    });
                });
            }).join().unwrap();
        });

        println!("the context of the parent thread is again {}", ExecutionContext::current());
    });
}
