// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use nestco::{current_frame, yield_now, Builder};

// A coroutine that drives a nested generator and forwards every second value.
fn main() {
    let mut outer = Builder::new()
        .name("outer")
        .create(|| {
            let mut inner = Builder::new()
                .name("inner")
                .stack_size(64 * 1024)
                .create(|| {
                    let mut a = 0usize;
                    let mut b = 1usize;
                    for _ in 0..10 {
                        println!("    [frame {}] fibonacci {}", current_frame(), a);
                        let next = a + b;
                        a = b;
                        b = next;
                        yield_now().unwrap();
                    }
                })
                .unwrap();

            while !inner.is_finished() {
                for _ in 0..2 {
                    if !inner.is_finished() {
                        inner.resume().unwrap();
                    }
                }
                println!("  [frame {}] two steps done", current_frame());
                yield_now().unwrap();
            }
        })
        .unwrap();

    let resumes = outer.run_to_completion().unwrap();
    println!("[frame {}] outer finished after {} resumes", current_frame(), resumes);
}
