// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use criterion::measurement::Measurement;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use multishot::{OnceResume, prompt, yield_once};

fn prompt_call<M: Measurement + 'static>(name: &str, c: &mut Criterion<M>) {
    c.bench_function(name, |b| {
        b.iter(|| prompt(|_p| black_box(0usize)));
    });
}

fn prompt_switch<M: Measurement + 'static>(name: &str, c: &mut Criterion<M>) {
    c.bench_function(name, |b| {
        b.iter(|| {
            prompt(|p| {
                let v: usize = yield_once(p, |r: OnceResume<usize, usize>| {
                    r.resume(black_box(1usize))
                });
                v
            })
        });
    });
}

fn prompt_tail_resume<M: Measurement + 'static>(name: &str, c: &mut Criterion<M>) {
    c.bench_function(name, |b| {
        b.iter(|| {
            prompt(|p| {
                let mut total = 0usize;
                for i in 0..100usize {
                    total += yield_once(p, |r: OnceResume<usize, usize>| {
                        // Safety: tail position; nothing live on this frame.
                        unsafe { r.resume_tail(black_box(i)) }
                    });
                }
                total
            })
        });
    });
}

fn prompt_call_time(c: &mut Criterion) {
    prompt_call("prompt_call_time", c);
}
fn prompt_switch_time(c: &mut Criterion) {
    prompt_switch("prompt_switch_time", c);
}
fn prompt_tail_resume_time(c: &mut Criterion) {
    prompt_tail_resume("prompt_tail_resume_time", c);
}

criterion_group!(
    name = time;
    config = Criterion::default();
    targets = prompt_call_time, prompt_switch_time, prompt_tail_resume_time
);

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86", target_arch = "x86_64"))] {
        use criterion_cycles_per_byte::CyclesPerByte;

        fn prompt_call_cycles(c: &mut Criterion<CyclesPerByte>) {
            prompt_call("prompt_call_cycles", c);
        }
        fn prompt_switch_cycles(c: &mut Criterion<CyclesPerByte>) {
            prompt_switch("prompt_switch_cycles", c);
        }

        criterion_group!(
            name = cycles;
            config = Criterion::default().with_measurement(CyclesPerByte);
            targets = prompt_call_cycles, prompt_switch_cycles
        );

        criterion_main!(cycles, time);
    } else {
        criterion_main!(time);
    }
}
