//! Multi-thread barrier rendezvous tests, mirroring the classic
//! 15-thread / 5-barrier / 10-iteration pipeline exercise.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    thread,
    time::Duration,
};

use okos_kernel::{
    KernelError,
    sync::{Barrier, BarrierWaitResult},
};

const THREADS: usize = 15;
const BARRIERS: usize = 5;
const ITERS: usize = 10;

#[test]
fn pipeline_rendezvous() {
    let barriers: Arc<Vec<Barrier>> =
        Arc::new((0..BARRIERS).map(|_| Barrier::new(THREADS as u32).unwrap()).collect());
    let serial: Arc<Vec<AtomicU32>> =
        Arc::new((0..BARRIERS).map(|_| AtomicU32::new(0)).collect());
    let pre: Arc<Vec<AtomicU32>> = Arc::new((0..BARRIERS).map(|_| AtomicU32::new(0)).collect());
    let post: Arc<Vec<AtomicU32>> = Arc::new((0..BARRIERS).map(|_| AtomicU32::new(0)).collect());

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let barriers = Arc::clone(&barriers);
            let serial = Arc::clone(&serial);
            let pre = Arc::clone(&pre);
            let post = Arc::clone(&post);
            thread::spawn(move || {
                for _ in 0..ITERS {
                    for (k, barrier) in barriers.iter().enumerate() {
                        pre[k].fetch_add(1, Ordering::SeqCst);
                        if barrier.wait().unwrap().is_serial() {
                            serial[k].fetch_add(1, Ordering::SeqCst);
                        }
                        post[k].fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    for k in 0..BARRIERS {
        assert_eq!(serial[k].load(Ordering::SeqCst), ITERS as u32);
        assert_eq!(pre[k].load(Ordering::SeqCst), (THREADS * ITERS) as u32);
        assert_eq!(post[k].load(Ordering::SeqCst), (THREADS * ITERS) as u32);
    }
}

#[test]
fn exactly_one_serial_per_generation() {
    let barrier = Arc::new(Barrier::new(4).unwrap());
    let serial_per_iter = Arc::new((0..50).map(|_| AtomicU32::new(0)).collect::<Vec<_>>());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let counts = Arc::clone(&serial_per_iter);
            thread::spawn(move || {
                for count in counts.iter() {
                    if barrier.wait().unwrap() == BarrierWaitResult::Serial {
                        count.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // All four threads sit at generation i's rendezvous together, so a
    // broadcast from generation i can never bleed into generation i+1.
    for count in serial_per_iter.iter() {
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn destroy_waits_for_drain() {
    let barrier = Arc::new(Barrier::new(8).unwrap());

    let handles: Vec<_> = (0..7)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || barrier.wait())
        })
        .collect();
    // Give the waiters time to park.
    thread::sleep(Duration::from_millis(50));

    // Mid-arrival: destroy must refuse.
    assert_eq!(barrier.destroy(), Err(KernelError::Busy));

    // Complete the rendezvous; this thread is the eighth arrival.
    assert!(barrier.wait().unwrap().is_serial());

    // Destroy is permitted while the other seven are still draining out;
    // it blocks until refcnt reaches zero, then poisons.
    barrier.destroy().unwrap();
    for h in handles {
        assert_eq!(h.join().unwrap().unwrap(), BarrierWaitResult::Released);
    }
    assert_eq!(barrier.wait(), Err(KernelError::InvalidArgument));
}
