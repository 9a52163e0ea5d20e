use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cv_generalized_stereo::prelude::*;
use image::{GrayImage, Luma};
use nalgebra::{Isometry3, Translation3, UnitQuaternion};

const WIDTH: usize = 320;
const HEIGHT: usize = 240;
const SHIFT: u32 = 6;

fn texture(x: u32, y: u32) -> u8 {
    let mut h = x.wrapping_mul(0x85eb_ca6b) ^ y.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2c1b_3c6d);
    h ^= h >> 12;
    (h >> 24) as u8
}

fn generalized_bench(c: &mut Criterion) {

    // Shifted texture seen by a lateral pinhole pair
    let left = GrayImage::from_fn(WIDTH as u32, HEIGHT as u32, |x, y| Luma([texture(x, y)]));
    let right = GrayImage::from_fn(WIDTH as u32, HEIGHT as u32, |x, y| Luma([texture(x + SHIFT, y)]));

    let fisheye = Eucm::new([150.0, 150.0, 160.0, 120.0, 0.6, 1.1], WIDTH, HEIGHT);
    let params = StereoParameters {
        disp_max: 48,
        block_size: 3,
        image_width: WIDTH,
        image_height: HEIGHT,
        ..StereoParameters::default()
    };
    let pose = Isometry3::from_parts(Translation3::new(0.1, 0.0, 0.0), UnitQuaternion::identity());

    // Build disparity alg
    let mut stereo = GeneralizedStereo::new(pose, &fisheye, &fisheye, params.clone()).unwrap();
    let frame = StereoFrame { left, right };

    // Benchmark the three invalidation rates
    c.bench_function("generalized compute 320x240", |b| b.iter(|| stereo.compute(black_box(&frame))));

    let poses = [
        pose,
        Isometry3::from_parts(Translation3::new(0.1, 0.01, 0.0), UnitQuaternion::from_euler_angles(0.0, 0.02, 0.0))
    ];
    let mut i = 0;
    c.bench_function("generalized set_pose 320x240", |b| {
        b.iter(|| {
            i = (i + 1) % poses.len();
            stereo.set_pose(black_box(poses[i]))
        })
    });

    c.bench_function("generalized new 320x240", |b| {
        b.iter(|| GeneralizedStereo::new(pose, &fisheye, &fisheye, black_box(params.clone())))
    });
}

criterion_group!(benches, generalized_bench);
criterion_main!(benches);
