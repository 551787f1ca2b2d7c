// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use nestco::{yield_now, Coroutine};

// Print the natural numbers from 0 to 4, one per resume.
fn main() {
    let mut co = Coroutine::new(|| {
        println!("co1 start");
        for i in 0..5 {
            println!("co1: {}", i);
            yield_now().unwrap();
        }
        println!("co1 end");
    })
    .unwrap();

    let mut resumes = 0;
    while !co.is_finished() {
        print!("Resuming => ");
        co.resume().unwrap();
        resumes += 1;
    }

    println!("Finished after {} resumes!", resumes);
}
