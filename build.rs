// Copyright 2016 coroutine-rs Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::env;
use std::path::PathBuf;

fn main() {
    let target = env::var("TARGET").expect("TARGET is set by cargo");

    // Windows switches contexts through the fiber API, no assembly needed.
    if target.contains("windows") {
        return;
    }

    let arch = match target.split('-').next() {
        Some("x86_64") => "x86_64",
        Some("arm64") | Some("aarch64") => "arm64",
        _ => {
            panic!("Unsupported architecture: {}", target);
        }
    };

    let abi = match arch {
        "arm64" => "aapcs",
        _ => "sysv",
    };

    let format = if target.contains("apple") {
        "macho"
    } else {
        "elf"
    };

    let prefixes = ["jump", "make"];
    let base_path: PathBuf = ["src", "asm"].iter().collect();
    let mut config = cc::Build::new();

    config.define("BOOST_CONTEXT_EXPORT", None);

    for prefix in prefixes.iter() {
        let file_name: [&str; 9] = [prefix, "_", arch, "_", abi, "_", format, "_gas", ".S"];
        let file_name = file_name.concat();

        let mut path = base_path.clone();
        path.push(file_name);
        println!("cargo:rerun-if-changed={}", path.display());
        config.file(path);
    }

    println!("cargo:rerun-if-changed=build.rs");
    config.compile("boost_context");
}
