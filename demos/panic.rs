// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use nestco::{yield_now, Coroutine, CoroutineError};

// This struct is used to demonstrate that the coroutine stack is actually being unwound.
struct Dropper;

impl Drop for Dropper {
    fn drop(&mut self) {
        println!("Dropping a Dropper!");
    }
}

fn main() {
    let mut co = Coroutine::new(|| {
        let _dropper = Dropper;
        for i in 0..3 {
            println!("Yielding {}", i);
            yield_now().unwrap();
        }
        panic!("giving up after 3 steps");
    })
    .unwrap();

    loop {
        match co.resume() {
            Ok(()) => println!("Resumed"),
            Err(CoroutineError::TaskFailure(panic)) => {
                println!("Recovered from a panic: {}", panic);
                break;
            }
            Err(err) => panic!("unexpected error: {}", err),
        }
    }

    assert!(co.is_finished());
    println!("Finished!");
}
