//! End-to-end frame loop tests across the real UI and raster threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use geometry::{Point, Rect, Size};
use layers::{ContainerLayer, LayerTree, Picture, PictureLayer, TextureLayer};

use crate::shell::{Shell, ShellConfig};
use crate::testing::{TestStudio, TestTexture};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn fast_config() -> ShellConfig {
    ShellConfig {
        pipeline_depth: 2,
        vsync_interval: Duration::from_millis(5),
        checkerboard_offscreen_layers: false,
    }
}

fn picture_tree(frame_number: u64, target_time: Instant) -> LayerTree {
    let mut root = ContainerLayer::new();
    root.add(Box::new(PictureLayer::new(
        Point::new(10.0, 10.0),
        Picture::new(Rect::from_ltrb(0.0, 0.0, 50.0, 50.0)),
    )));
    LayerTree::new(
        Some(Box::new(root)),
        Size::new(320.0, 240.0),
        1.0,
        target_time,
        frame_number,
    )
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    done()
}

#[test]
fn shell_presents_frames_end_to_end() {
    init_logging();
    let studio = TestStudio::new();
    let stats = studio.stats();
    let builds = Arc::new(AtomicUsize::new(0));
    let build_counter = builds.clone();

    let mut shell = Shell::new(
        fast_config(),
        Box::new(studio),
        Box::new(move |request| {
            build_counter.fetch_add(1, Ordering::SeqCst);
            Some(picture_tree(request.frame_number, request.frame_target_time))
        }),
    );
    shell.start();
    assert!(
        wait_until(Duration::from_secs(5), || stats.frames_submitted() >= 3),
        "expected at least 3 presented frames, got {}",
        stats.frames_submitted()
    );
    shell.shutdown();

    assert!(builds.load(Ordering::SeqCst) >= stats.frames_submitted());
    assert!(stats.last_frame_ops().iter().any(|op| op.is_draw()));
    let presented = shell.with_rasterizer(|rasterizer| rasterizer.frames_presented());
    assert!(presented >= 3);
}

#[test]
fn stalled_raster_thread_backpressures_the_builder() {
    init_logging();
    let studio = TestStudio::new();
    let builds = Arc::new(AtomicUsize::new(0));
    let build_counter = builds.clone();

    let mut shell = Shell::new(
        fast_config(),
        Box::new(studio),
        Box::new(move |request| {
            build_counter.fetch_add(1, Ordering::SeqCst);
            Some(picture_tree(request.frame_number, request.frame_target_time))
        }),
    );
    // Wedge the raster thread so consumed frames stop flowing.
    shell.raster_runner().post(|| {
        std::thread::sleep(Duration::from_millis(150));
    });
    shell.start();
    std::thread::sleep(Duration::from_millis(100));
    let builds_while_stalled = builds.load(Ordering::SeqCst);

    // Depth 2 bounds how far the builder can run ahead of the rasterizer.
    assert!(
        builds_while_stalled <= shell.pipeline().depth(),
        "builder ran {builds_while_stalled} frames ahead of a wedged rasterizer"
    );
    std::thread::sleep(Duration::from_millis(150));
    assert!(
        builds.load(Ordering::SeqCst) > builds_while_stalled,
        "builder never resumed after the stall cleared"
    );
    shell.shutdown();
}

#[test]
fn newest_frame_wins_after_a_stall() {
    init_logging();
    let studio = TestStudio::new();
    let stats = studio.stats();

    let mut shell = Shell::new(
        fast_config(),
        Box::new(studio),
        Box::new(move |request| {
            Some(picture_tree(request.frame_number, request.frame_target_time))
        }),
    );
    shell.raster_runner().post(|| {
        std::thread::sleep(Duration::from_millis(60));
    });
    shell.start();
    assert!(
        wait_until(Duration::from_secs(5), || stats.frames_submitted() >= 2),
        "frame loop never recovered from the stall"
    );
    shell.shutdown();

    // Frames completed during the stall beyond the newest were recycled.
    assert!(
        shell.pipeline().dropped_count() >= 1,
        "a stall long enough to fill the pipeline must recycle stale frames"
    );
}

#[test]
fn textures_survive_registration_and_see_teardown() {
    init_logging();
    let studio = TestStudio::new();
    let stats = studio.stats();
    let texture = Arc::new(TestTexture::default());
    let registered_id = Arc::new(AtomicUsize::new(0));

    let id_for_tree = registered_id.clone();
    let mut shell = Shell::new(
        fast_config(),
        Box::new(studio),
        Box::new(move |request| {
            let id = id_for_tree.load(Ordering::SeqCst) as u64;
            if id == 0 {
                return None;
            }
            let mut root = ContainerLayer::new();
            root.add(Box::new(TextureLayer::new(
                Rect::from_ltrb(0.0, 0.0, 64.0, 64.0),
                id,
            )));
            Some(LayerTree::new(
                Some(Box::new(root)),
                Size::new(320.0, 240.0),
                1.0,
                request.frame_target_time,
                request.frame_number,
            ))
        }),
    );

    {
        let texture = texture.clone();
        let registered_id = registered_id.clone();
        shell.post_raster_task(move |rasterizer| {
            let id = rasterizer.texture_registry_mut().register_texture(texture);
            registered_id.store(id as usize, Ordering::SeqCst);
        });
    }
    shell.start();
    assert!(
        wait_until(Duration::from_secs(5), || stats.frames_submitted() >= 1),
        "no textured frame was ever presented"
    );
    shell.shutdown();

    assert!(texture.images_made() >= 1, "texture was never sampled");
    assert_eq!(texture.context_destroyed(), 1, "teardown fanout missed");
}

#[test]
fn shutdown_is_idempotent_and_clears_context() {
    init_logging();
    let studio = TestStudio::new();
    let stats = studio.stats();
    let mut shell = Shell::new(fast_config(), Box::new(studio), Box::new(|_| None));
    shell.start();
    shell.shutdown();
    shell.shutdown();
    assert_eq!(stats.context_cleared_calls(), 1);
}

#[test]
fn declining_builder_presents_nothing() {
    init_logging();
    let studio = TestStudio::new();
    let stats = studio.stats();
    let mut shell = Shell::new(fast_config(), Box::new(studio), Box::new(|_| None));
    shell.start();
    std::thread::sleep(Duration::from_millis(50));
    shell.shutdown();
    assert_eq!(stats.frames_acquired(), 0);
    assert!(shell.pipeline().is_idle());
}
