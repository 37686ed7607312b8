use std::collections::HashSet;
use std::sync::Arc;

use chunky::{
    BlendMode, ChunkPool, ChunkResolution, ChunkyImage, ColorSpace, CommittedChunkStorage, EngineConfig, RectI,
    RectangleData, Surface, VecI,
};
use image::Rgba;

const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

fn image(w: i32, h: i32, chunk_size: u32) -> ChunkyImage {
    ChunkyImage::new(VecI::new(w, h), ChunkPool::with_chunk_size(chunk_size).unwrap()).unwrap()
}

fn chunks(list: &[(i32, i32)]) -> HashSet<VecI> {
    list.iter().map(|&c| VecI::from(c)).collect()
}

fn solid(w: i32, h: i32, color: Rgba<u8>) -> Surface {
    let mut s = Surface::new(VecI::new(w, h), ColorSpace::Srgb).unwrap();
    s.fill_rect(RectI::new(0, 0, w, h), color, BlendMode::Src);
    s
}

#[test]
fn rectangle_on_tiny_tiles_commits_every_chunk() {
    let img = image(4, 4, 2);
    img.enqueue_draw_rectangle(&RectangleData::filled(VecI::ZERO, VecI::new(4, 4), RED))
        .unwrap();
    img.commit_changes();

    assert_eq!(img.find_all_chunks(), chunks(&[(0, 0), (1, 0), (0, 1), (1, 1)]));
    assert_eq!(img.get_committed_pixel(VecI::new(0, 0)), RED);
    assert_eq!(img.get_committed_pixel(VecI::new(3, 3)), RED);
    assert_eq!(img.queue_len(), 0);
}

#[test]
fn clear_then_commit_leaves_nothing() {
    let img = image(8, 8, 4);
    img.enqueue_draw_rectangle(&RectangleData::filled(VecI::new(1, 1), VecI::new(6, 6), GREEN))
        .unwrap();
    img.commit_changes();
    assert!(!img.check_if_committed_is_empty());

    img.enqueue_clear();
    img.commit_changes();
    assert!(img.find_committed_chunks().is_empty());
    assert!(img.check_if_committed_is_empty());
    assert_eq!(img.get_committed_pixel(VecI::new(3, 3)), CLEAR);
}

#[test]
fn cancelled_draw_leaves_chunks_unchanged() {
    let img = image(8, 8, 4);
    img.enqueue_draw_rectangle(&RectangleData::filled(VecI::ZERO, VecI::new(2, 2), RED))
        .unwrap();
    img.commit_changes();
    let before = img.find_all_chunks();

    img.enqueue_draw_image(VecI::new(2, 2), &solid(6, 6, GREEN), BlendMode::SrcOver)
        .unwrap();
    assert_eq!(img.find_all_chunks().len(), 4);
    assert_eq!(img.get_most_up_to_date_pixel(VecI::new(7, 7)), GREEN);

    img.cancel_changes();
    assert_eq!(img.find_all_chunks(), before);
    assert_eq!(img.get_most_up_to_date_pixel(VecI::new(7, 7)), CLEAR);
    assert_eq!(img.queue_progress(VecI::new(1, 1), ChunkResolution::Full), None);
}

#[test]
fn cancel_restores_canvas_size() {
    let img = image(8, 8, 4);
    img.enqueue_resize(VecI::new(3, 12)).unwrap();
    assert_eq!(img.latest_size(), VecI::new(3, 12));
    img.cancel_changes();
    assert_eq!(img.latest_size(), VecI::new(8, 8));
    assert_eq!(img.committed_size(), VecI::new(8, 8));
}

#[test]
fn repeated_reads_do_not_reapply_operations() {
    let img = image(8, 8, 4);
    img.enqueue_draw_rectangle(
        &RectangleData::filled(VecI::ZERO, VecI::new(8, 8), Rgba([255, 0, 0, 128]))
            .with_blend_mode(BlendMode::SrcOver),
    )
    .unwrap();

    let first = img.get_latest_chunk(VecI::ZERO, ChunkResolution::Full).unwrap();
    let progress = img.queue_progress(VecI::ZERO, ChunkResolution::Full);
    let second = img.get_latest_chunk(VecI::ZERO, ChunkResolution::Full).unwrap();
    assert_eq!(first, second);
    assert_eq!(img.queue_progress(VecI::ZERO, ChunkResolution::Full), progress);
}

#[test]
fn snapshot_restores_committed_pixels() {
    let img = image(12, 8, 4);
    img.enqueue_draw_rectangle(&RectangleData::filled(VecI::new(1, 1), VecI::new(5, 5), RED))
        .unwrap();
    img.commit_changes();
    let before = img.to_surface().unwrap();

    img.enqueue_draw_rectangle(&RectangleData::filled(VecI::new(3, 0), VecI::new(9, 8), GREEN))
        .unwrap();
    img.enqueue_clear_region(VecI::new(0, 0), VecI::new(2, 2)).unwrap();
    let mut storage = CommittedChunkStorage::new(&img, &img.find_affected_chunks());
    img.commit_changes();
    assert_ne!(img.to_surface().unwrap(), before);

    storage.apply_chunks_to_image(&img).unwrap();
    img.commit_changes();
    assert_eq!(img.to_surface().unwrap(), before);

    storage.dispose();
    assert!(storage.apply_chunks_to_image(&img).is_err());
}

#[test]
fn clip_to_another_store_masks_drawing() {
    let pool = ChunkPool::with_chunk_size(4).unwrap();
    let mask = Arc::new(ChunkyImage::new(VecI::new(8, 8), Arc::clone(&pool)).unwrap());
    // opaque on the left half of chunk (0,0) only; chunk (1,0) absent
    mask.enqueue_draw_rectangle(&RectangleData::filled(VecI::ZERO, VecI::new(2, 8), GREEN))
        .unwrap();
    mask.commit_changes();

    let img = ChunkyImage::new(VecI::new(8, 8), pool).unwrap();
    img.enqueue_draw_rectangle(&RectangleData::filled(VecI::ZERO, VecI::new(8, 8), RED))
        .unwrap();
    img.enqueue_apply_raster_clip(&mask).unwrap();
    assert_eq!(img.find_affected_chunks().len(), 4);

    assert_eq!(img.get_most_up_to_date_pixel(VecI::new(1, 1)), RED);
    img.commit_changes();
    assert_eq!(img.get_committed_pixel(VecI::new(1, 1)), RED);
    assert_eq!(img.get_committed_pixel(VecI::new(1, 6)), RED);
    assert_eq!(img.get_committed_pixel(VecI::new(3, 1)), CLEAR);
    assert_eq!(img.get_committed_pixel(VecI::new(6, 1)), CLEAR);
    assert!(!img.committed_chunk_exists(VecI::new(1, 0)));
}

/// A red 4×4 image and a mask that is opaque on columns 0..2 of the same
/// chunk and transparent on columns 2..4.
fn red_image_with_half_mask() -> (ChunkyImage, Arc<ChunkyImage>) {
    let pool = ChunkPool::with_chunk_size(4).unwrap();
    let mask = Arc::new(ChunkyImage::new(VecI::new(4, 4), Arc::clone(&pool)).unwrap());
    mask.enqueue_draw_rectangle(&RectangleData::filled(VecI::ZERO, VecI::new(2, 4), GREEN))
        .unwrap();
    mask.commit_changes();

    let img = ChunkyImage::new(VecI::new(4, 4), pool).unwrap();
    img.enqueue_draw_rectangle(&RectangleData::filled(VecI::ZERO, VecI::new(4, 4), RED))
        .unwrap();
    img.commit_changes();
    img.enqueue_apply_raster_clip(&mask).unwrap();
    (img, mask)
}

#[test]
fn clipped_clear_region_erases_inside_mask_only() {
    let (img, _mask) = red_image_with_half_mask();
    img.enqueue_clear_region(VecI::ZERO, VecI::new(4, 4)).unwrap();
    assert_eq!(img.get_most_up_to_date_pixel(VecI::new(1, 2)), CLEAR);
    img.commit_changes();
    assert_eq!(img.get_committed_pixel(VecI::new(0, 0)), CLEAR);
    assert_eq!(img.get_committed_pixel(VecI::new(1, 3)), CLEAR);
    assert_eq!(img.get_committed_pixel(VecI::new(2, 0)), RED);
    assert_eq!(img.get_committed_pixel(VecI::new(3, 3)), RED);
}

#[test]
fn clipped_src_draw_replaces_inside_mask_only() {
    let (img, _mask) = red_image_with_half_mask();
    let translucent_blue = Rgba([0, 0, 255, 128]);
    img.enqueue_draw_rectangle(
        &RectangleData::filled(VecI::ZERO, VecI::new(4, 4), translucent_blue).with_blend_mode(BlendMode::Src),
    )
    .unwrap();
    img.commit_changes();
    assert_eq!(img.get_committed_pixel(VecI::new(1, 1)), translucent_blue);
    assert_eq!(img.get_committed_pixel(VecI::new(2, 1)), RED);
}

#[test]
fn clipped_opaque_draw_over_opaque_content_does_not_blend_colors() {
    let blue = Rgba([0, 0, 255, 255]);
    let (img, _mask) = red_image_with_half_mask();
    img.enqueue_draw_rectangle(&RectangleData::filled(VecI::ZERO, VecI::new(4, 4), blue))
        .unwrap();
    img.commit_changes();
    for y in 0..4 {
        assert_eq!(img.get_committed_pixel(VecI::new(0, y)), blue);
        assert_eq!(img.get_committed_pixel(VecI::new(1, y)), blue);
        assert_eq!(img.get_committed_pixel(VecI::new(2, y)), RED);
        assert_eq!(img.get_committed_pixel(VecI::new(3, y)), RED);
    }
}

#[test]
fn lower_tiers_are_deterministic_and_consistent() {
    let img = image(16, 16, 8);
    img.enqueue_draw_rectangle(
        &RectangleData::filled(VecI::new(3, 2), VecI::new(11, 9), RED).with_stroke(2, GREEN),
    )
    .unwrap();
    img.commit_changes();

    for pos in img.find_committed_chunks() {
        for res in ChunkResolution::ALL {
            let a = img.get_committed_chunk(pos, res).unwrap();
            let b = img.get_committed_chunk(pos, res).unwrap();
            assert_eq!(a, b);
            let derived = img
                .with_committed_chunk(pos, ChunkResolution::Full, |c| c.downsample(res).surface().clone())
                .unwrap();
            assert_eq!(a, derived, "{pos:?} at {res:?}");
            assert_eq!(a.width(), res.pixel_size(8));
        }
    }
}

#[test]
fn draw_latest_chunk_composites_into_viewport() {
    let img = image(8, 8, 4);
    img.enqueue_draw_rectangle(&RectangleData::filled(VecI::new(4, 4), VecI::new(4, 4), RED))
        .unwrap();

    let mut viewport = Surface::new(VecI::new(4, 4), ColorSpace::Srgb).unwrap();
    assert!(img.draw_latest_chunk_on(VecI::new(1, 1), ChunkResolution::Half, &mut viewport, VecI::new(2, 2), BlendMode::SrcOver));
    assert_eq!(viewport.get_pixel(3, 3), Some(RED));
    assert_eq!(viewport.get_pixel(0, 0), Some(CLEAR));
    assert!(!img.draw_committed_chunk_on(VecI::new(1, 1), ChunkResolution::Full, &mut viewport, VecI::ZERO, BlendMode::SrcOver));
    assert!(!img.draw_latest_chunk_on(VecI::ZERO, ChunkResolution::Full, &mut viewport, VecI::ZERO, BlendMode::SrcOver));
}

#[test]
fn config_from_toml_drives_pool_and_image() {
    let config = EngineConfig::from_toml_str(
        r#"
        chunk_size = 16
        pool_capacity = 4
        cleanup_interval = 1
        color_space = "Srgb"
        "#,
    )
    .unwrap();
    let pool = Arc::new(ChunkPool::new(&config).unwrap());
    let img = ChunkyImage::with_config(VecI::new(32, 16), pool, &config).unwrap();
    img.enqueue_draw_rectangle(&RectangleData::filled(VecI::ZERO, VecI::new(32, 16), RED))
        .unwrap();
    img.enqueue_clear_region(VecI::new(16, 0), VecI::new(16, 16)).unwrap();
    img.commit_changes();
    // cleanup runs on every commit with interval 1
    assert_eq!(img.find_committed_chunks(), chunks(&[(0, 0)]));

    assert!(EngineConfig::from_toml_str("chunk_size = 12").is_err());
    let mismatched = EngineConfig::with_chunk_size(32);
    let pool = ChunkPool::with_chunk_size(16).unwrap();
    assert!(ChunkyImage::with_config(VecI::new(4, 4), pool, &mismatched).is_err());
}
