use criterion::{black_box, criterion_group, criterion_main, Criterion};
use iso14b_rs::afe::mock::{encode_tag_iq, reader_bit_samples};
use iso14b_rs::phy::{Demod, Uart};
use std::time::Duration;

// A full ATQB answer and a WUPB command, as the sample streams the decoders
// actually chew through. The demodulator runs once per half-ETU on hardware,
// so per-sample cost is the number that matters.
fn benchmark_tag_demod(c: &mut Criterion) {
    let atqb = [
        0x50, 0x82, 0x0D, 0xE1, 0x74, 0x20, 0x38, 0x19, 0x22, 0x00, 0x21, 0x85, 0x5E, 0xD7,
    ];
    let samples = encode_tag_iq(&atqb);

    let mut group = c.benchmark_group("demod");
    group.measurement_time(Duration::from_secs(10));
    group.warm_up_time(Duration::from_secs(3));

    group.bench_function("atqb_frame", |b| {
        b.iter(|| {
            let mut demod = Demod::new();
            for &w in black_box(&samples) {
                if demod.sample((w >> 8) as i8, w as i8) {
                    break;
                }
            }
            demod.take_frame()
        });
    });

    group.finish();
}

fn benchmark_reader_uart(c: &mut Criterion) {
    let samples = reader_bit_samples(&[0x05, 0x00, 0x00, 0x71, 0xFF]);

    c.bench_function("uart_wupb_frame", |b| {
        b.iter(|| {
            let mut uart = Uart::new();
            for &bit in black_box(&samples) {
                if uart.sample(bit) {
                    break;
                }
            }
            uart.take_frame()
        });
    });
}

criterion_group!(benches, benchmark_tag_demod, benchmark_reader_uart);
criterion_main!(benches);
