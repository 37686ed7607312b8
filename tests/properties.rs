//! Seeded random edit sequences checked against the store's invariants.

use std::sync::Arc;

use chunky::{
    BlendMode, ChunkPool, ChunkResolution, ChunkyImage, ColorSpace, RectI, RectangleData, Surface, VecI,
};
use image::Rgba;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const CHUNK: u32 = 4;
const CANVAS: i32 = 16;

fn random_color(rng: &mut StdRng) -> Rgba<u8> {
    let alpha = if rng.gen_bool(0.7) { 255 } else { rng.gen_range(1..255) };
    Rgba([rng.r#gen(), rng.r#gen(), rng.r#gen(), alpha])
}

fn random_rect(rng: &mut StdRng) -> (VecI, VecI) {
    let pos = VecI::new(rng.gen_range(-4..CANVAS), rng.gen_range(-4..CANVAS));
    let size = VecI::new(rng.gen_range(1..12), rng.gen_range(1..12));
    (pos, size)
}

/// Enqueue one random operation.  `allow_resize` keeps size-changing edits
/// out of tests that compare whole surfaces.
fn random_op(img: &ChunkyImage, rng: &mut StdRng, allow_resize: bool) {
    match rng.gen_range(0..10) {
        0..=3 => {
            let (pos, size) = random_rect(rng);
            let mut rect = RectangleData::filled(pos, size, random_color(rng));
            if rng.gen_bool(0.3) {
                rect = rect.with_stroke(rng.gen_range(0..3), random_color(rng));
            }
            if rng.gen_bool(0.2) {
                rect = rect.with_blend_mode(BlendMode::Src);
            }
            img.enqueue_draw_rectangle(&rect).unwrap();
        }
        4 | 5 => {
            let (pos, size) = random_rect(rng);
            let mut surface = Surface::new(size, ColorSpace::Srgb).unwrap();
            for y in 0..size.y {
                for x in 0..size.x {
                    if rng.gen_bool(0.6) {
                        surface.fill_rect(RectI::new(x, y, 1, 1), random_color(rng), BlendMode::Src);
                    }
                }
            }
            if rng.gen_bool(0.3) {
                img.enqueue_draw_image_ignoring_empty(pos, &surface, BlendMode::SrcOver).unwrap();
            } else {
                img.enqueue_draw_image(pos, &surface, BlendMode::SrcOver).unwrap();
            }
        }
        6 => {
            let (pos, size) = random_rect(rng);
            img.enqueue_clear_region(pos, size).unwrap();
        }
        7 if allow_resize => {
            let size = VecI::new(rng.gen_range(1..=CANVAS), rng.gen_range(1..=CANVAS));
            img.enqueue_resize(size).unwrap();
        }
        8 => {
            if rng.gen_bool(0.2) {
                img.enqueue_clear();
            } else {
                img.enqueue_apply_self_clip();
            }
        }
        _ => {
            // interleave reads so some chunks are materialized mid-batch
            let pos = VecI::new(rng.gen_range(0..CANVAS / CHUNK as i32), rng.gen_range(0..CANVAS / CHUNK as i32));
            let res = ChunkResolution::ALL[rng.gen_range(0..4)];
            let _ = img.get_latest_chunk(pos, res);
        }
    }
}

fn committed_pixels(img: &ChunkyImage) -> Vec<Rgba<u8>> {
    let mut out = Vec::new();
    for y in 0..CANVAS {
        for x in 0..CANVAS {
            out.push(img.get_committed_pixel(VecI::new(x, y)));
        }
    }
    out
}

fn latest_pixels(img: &ChunkyImage) -> Vec<Rgba<u8>> {
    let mut out = Vec::new();
    for y in 0..CANVAS {
        for x in 0..CANVAS {
            out.push(img.get_most_up_to_date_pixel(VecI::new(x, y)));
        }
    }
    out
}

fn new_image() -> ChunkyImage {
    ChunkyImage::new(VecI::new(CANVAS, CANVAS), ChunkPool::with_chunk_size(CHUNK).unwrap()).unwrap()
}

#[test]
fn commit_matches_latest_view() {
    for seed in 0..40u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let img = new_image();
        for _batch in 0..4 {
            for _ in 0..rng.gen_range(1..12) {
                random_op(&img, &mut rng, true);
            }
            let latest = latest_pixels(&img);
            let latest_size = img.latest_size();
            img.commit_changes();
            assert_eq!(img.committed_size(), latest_size, "seed {seed}");
            assert_eq!(committed_pixels(&img), latest, "seed {seed}");
        }
    }
}

#[test]
fn cancel_leaves_committed_state_untouched() {
    for seed in 100..140u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let img = new_image();
        for _ in 0..8 {
            random_op(&img, &mut rng, false);
        }
        img.commit_changes();

        let pixels = committed_pixels(&img);
        let chunks = img.find_committed_chunks();
        let size = img.committed_size();
        for _ in 0..rng.gen_range(1..16) {
            random_op(&img, &mut rng, true);
        }
        let _ = latest_pixels(&img);
        img.cancel_changes();

        assert_eq!(committed_pixels(&img), pixels, "seed {seed}");
        assert_eq!(latest_pixels(&img), pixels, "seed {seed}");
        assert_eq!(img.find_committed_chunks(), chunks, "seed {seed}");
        assert_eq!(img.latest_size(), size, "seed {seed}");
        assert_eq!(img.queue_len(), 0);
    }
}

#[test]
fn committed_tiers_stay_consistent_with_full() {
    for seed in 200..230u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let img = new_image();
        for _batch in 0..3 {
            for _ in 0..rng.gen_range(1..10) {
                random_op(&img, &mut rng, true);
            }
            img.commit_changes();
            for pos in img.find_committed_chunks() {
                for res in &ChunkResolution::ALL[1..] {
                    let tier = img.get_committed_chunk(pos, *res).unwrap();
                    let derived = img
                        .with_committed_chunk(pos, ChunkResolution::Full, |c| c.downsample(*res).surface().clone())
                        .unwrap();
                    assert_eq!(tier, derived, "seed {seed} chunk {pos:?} {res:?}");
                }
            }
        }
    }
}

#[test]
fn clones_match_the_source_latest_state() {
    for seed in 300..320u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let img = new_image();
        for _ in 0..10 {
            random_op(&img, &mut rng, false);
        }
        let copy = img.clone_from_latest().unwrap();
        assert_eq!(committed_pixels(&copy), latest_pixels(&img), "seed {seed}");
    }
}

#[test]
fn stores_share_one_pool_across_threads() {
    let pool = ChunkPool::with_chunk_size(CHUNK).unwrap();
    std::thread::scope(|s| {
        for seed in 0..4u64 {
            let pool = Arc::clone(&pool);
            s.spawn(move || {
                let mut rng = StdRng::seed_from_u64(seed);
                let img = ChunkyImage::new(VecI::new(CANVAS, CANVAS), pool).unwrap();
                for _ in 0..5 {
                    for _ in 0..6 {
                        random_op(&img, &mut rng, true);
                    }
                    img.commit_changes();
                }
            });
        }
    });
    assert!(pool.pooled_count() > 0);
}
