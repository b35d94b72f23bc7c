//! # Concurrent Store Test
//!
//! One writer thread hammers the store while a reader polls it the way a
//! frame loop does. Every snapshot the reader observes must be a whole
//! batch, never a mix of two.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use mimic_core::EntityStore;
use mimic_protocol::{DecodedMessage, Mat4x4, Point3, Ray};

const BATCH: usize = 64;
const ROUNDS: u32 = 2_000;

fn batch(generation: u32) -> Vec<Ray> {
    let g = generation as f32;
    vec![Ray::new(Point3::new(g, g, g), Point3::new(0.0, 0.0, 1.0)); BATCH]
}

#[test]
fn test_reader_never_sees_torn_ray_batch() {
    let store = Arc::new(EntityStore::new());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let store = Arc::clone(&store);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for generation in 1..=ROUNDS {
                store.ray_buffer().publish_with(|rays| rays.extend(batch(generation)));
            }
            done.store(true, Ordering::Release);
        })
    };

    let mut held = Vec::new();
    let mut seen = 0u32;
    while !done.load(Ordering::Acquire) {
        if let Some(rays) = store.take_rays_if_changed() {
            assert_eq!(rays.len(), BATCH);
            let first = rays[0];
            assert!(rays.iter().all(|r| *r == first), "torn batch");
            seen += 1;
            if held.len() < 8 {
                held.push((first, rays));
            }
        }
    }
    writer.join().unwrap();

    // Snapshots taken early are still intact after thousands of swaps
    for (first, rays) in held {
        assert!(rays.iter().all(|r| *r == first));
    }
    assert!(seen >= 1 || store.take_rays_if_changed().is_some());
    assert_eq!(store.ray_buffer().generation(), u64::from(ROUNDS));
}

#[test]
fn test_distinct_entities_update_independently() {
    let store = Arc::new(EntityStore::new());

    let cameras = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for id in 0..200u8 {
                store.apply(DecodedMessage::CameraPose {
                    camera_id: id,
                    pose: Mat4x4::IDENTITY,
                });
            }
        })
    };
    let points = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 0..200u32 {
                store.apply(DecodedMessage::Intersections(vec![Point3::new(
                    i as f32, 0.0, 0.0,
                )]));
            }
        })
    };

    cameras.join().unwrap();
    points.join().unwrap();

    assert_eq!(store.drain_cameras().len(), 200);
    let last = store.take_intersections_if_changed().unwrap();
    assert_eq!(last, vec![Point3::new(199.0, 0.0, 0.0)]);
}
