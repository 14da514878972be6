//! Lifecycle tests for shared device instances
//!
//! Verifies the reference-counting contract: the hardware is activated by the
//! first `start` and deactivated by the last `stop`, no matter how many streams
//! share the device or how many threads race on it, and failed transitions
//! leave the shared state untouched.
//!
//! Run with: `cargo test -p ahal-device --test lifecycle_test`

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use ahal_core::{
    AudioRoute, BackendFactory, BackendKind, DeviceAttributes, DeviceBackend, DeviceId, HalError,
    ResourceManager, Result, StreamHandle,
};
use ahal_device::{DeviceLifecycle, DeviceRegistry, LifecycleState};
use mockall::mock;
use parking_lot::Mutex;
use proptest::prelude::*;

// ============================================================================
// Test doubles
// ============================================================================

/// Call counters shared between a backend and the test
#[derive(Default)]
struct Calls {
    created: AtomicUsize,
    open: AtomicUsize,
    close: AtomicUsize,
    prepare: AtomicUsize,
    start: AtomicUsize,
    stop: AtomicUsize,
    enable: AtomicUsize,
    disable: AtomicUsize,
    fail_open: AtomicBool,
    fail_start: AtomicBool,
    fail_close: AtomicBool,
}

impl Calls {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct CountingBackend {
    calls: Arc<Calls>,
}

impl DeviceBackend for CountingBackend {
    fn open(&mut self, _: &DeviceAttributes, _: &Arc<dyn ResourceManager>) -> Result<()> {
        self.calls.open.fetch_add(1, Ordering::SeqCst);
        if self.calls.fail_open.load(Ordering::SeqCst) {
            return Err(HalError::backend("open", -16));
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.calls.close.fetch_add(1, Ordering::SeqCst);
        if self.calls.fail_close.load(Ordering::SeqCst) {
            return Err(HalError::backend("close", -5));
        }
        Ok(())
    }

    fn prepare(&mut self) -> Result<()> {
        self.calls.prepare.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.calls.start.fetch_add(1, Ordering::SeqCst);
        if self.calls.fail_start.load(Ordering::SeqCst) {
            return Err(HalError::backend("start", -32));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.calls.stop.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Alsa
    }
}

struct CountingFactory {
    calls: Arc<Calls>,
}

impl BackendFactory for CountingFactory {
    fn create(&self, _kind: BackendKind) -> Result<Box<dyn DeviceBackend>> {
        self.calls.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingBackend {
            calls: Arc::clone(&self.calls),
        }))
    }
}

struct CountingRoute {
    calls: Arc<Calls>,
}

impl AudioRoute for CountingRoute {
    fn enable_device(&self, _device_name: &str) -> Result<()> {
        self.calls.enable.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disable_device(&self, _device_name: &str) -> Result<()> {
        self.calls.disable.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Resources {
    route: Arc<dyn AudioRoute>,
}

impl ResourceManager for Resources {
    fn backend_kind(&self) -> BackendKind {
        BackendKind::Alsa
    }

    fn active_streams(&self, _device: DeviceId) -> Result<Vec<StreamHandle>> {
        Ok(Vec::new())
    }

    fn device_name(&self, device: DeviceId) -> Result<String> {
        Ok(device.as_str().to_string())
    }

    fn audio_route(&self) -> Result<Arc<dyn AudioRoute>> {
        Ok(Arc::clone(&self.route))
    }
}

fn counting_device() -> (Arc<DeviceLifecycle>, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let resources = Arc::new(Resources {
        route: Arc::new(CountingRoute {
            calls: Arc::clone(&calls),
        }),
    });
    let device = DeviceLifecycle::new(
        DeviceAttributes::new(DeviceId::OutSpeaker),
        resources,
        Arc::new(CountingFactory {
            calls: Arc::clone(&calls),
        }),
    );
    (Arc::new(device), calls)
}

mock! {
    pub Backend {}

    impl DeviceBackend for Backend {
        fn open(
            &mut self,
            attributes: &DeviceAttributes,
            resources: &Arc<dyn ResourceManager>,
        ) -> Result<()>;
        fn close(&mut self) -> Result<()>;
        fn prepare(&mut self) -> Result<()>;
        fn start(&mut self) -> Result<()>;
        fn stop(&mut self) -> Result<()>;
        fn kind(&self) -> BackendKind;
    }
}

mock! {
    pub Route {}

    impl AudioRoute for Route {
        fn enable_device(&self, device_name: &str) -> Result<()>;
        fn disable_device(&self, device_name: &str) -> Result<()>;
    }
}

/// Hands out one prepared mock backend
struct OneShotFactory {
    backend: Mutex<Option<Box<dyn DeviceBackend>>>,
}

impl OneShotFactory {
    fn new(mut backend: MockBackend) -> Self {
        backend.expect_kind().return_const(BackendKind::Alsa);
        let backend: Box<dyn DeviceBackend> = Box::new(backend);
        Self {
            backend: Mutex::new(Some(backend)),
        }
    }
}

impl BackendFactory for OneShotFactory {
    fn create(&self, _kind: BackendKind) -> Result<Box<dyn DeviceBackend>> {
        self.backend
            .lock()
            .take()
            .ok_or_else(|| HalError::AllocationFailure("backend already handed out".into()))
    }
}

fn mocked_device(backend: MockBackend, route: MockRoute) -> DeviceLifecycle {
    DeviceLifecycle::new(
        DeviceAttributes::new(DeviceId::OutSpeaker),
        Arc::new(Resources {
            route: Arc::new(route),
        }),
        Arc::new(OneShotFactory::new(backend)),
    )
}

// ============================================================================
// 1. Reference counting
// ============================================================================

#[test]
fn test_n_starts_and_stops_activate_once() {
    let (device, calls) = counting_device();
    device.open().unwrap();

    for _ in 0..5 {
        device.start().unwrap();
    }
    assert_eq!(device.reference_count(), 5);

    for _ in 0..5 {
        device.stop().unwrap();
    }
    assert_eq!(device.reference_count(), 0);
    assert_eq!(Calls::get(&calls.start), 1);
    assert_eq!(Calls::get(&calls.stop), 1);
    assert_eq!(Calls::get(&calls.enable), 1);
    assert_eq!(Calls::get(&calls.disable), 1);
}

#[test]
fn test_open_twice_allocates_once() {
    let (device, calls) = counting_device();
    device.open().unwrap();
    device.open().unwrap();

    assert_eq!(Calls::get(&calls.created), 1);
    assert_eq!(Calls::get(&calls.open), 1);
}

#[test]
fn test_close_with_active_streams_keeps_backend() {
    let (device, calls) = counting_device();
    device.open().unwrap();
    device.start().unwrap();

    device.close().unwrap();
    assert_eq!(Calls::get(&calls.close), 0);
    assert!(device.is_initialized());
    assert_eq!(device.state(), LifecycleState::Started(1));

    device.stop().unwrap();
    device.close().unwrap();
    assert_eq!(Calls::get(&calls.close), 1);
    assert_eq!(device.state(), LifecycleState::Closed);
}

#[test]
fn test_prepare_skipped_while_running() {
    let (device, calls) = counting_device();
    device.open().unwrap();

    device.prepare().unwrap();
    assert_eq!(Calls::get(&calls.prepare), 1);

    device.start().unwrap();
    let after_start = Calls::get(&calls.prepare);
    device.prepare().unwrap();
    assert_eq!(Calls::get(&calls.prepare), after_start);
}

#[test]
fn test_stop_at_zero_does_not_underflow() {
    let (device, calls) = counting_device();
    device.open().unwrap();

    let err = device.stop().unwrap_err();
    assert!(matches!(err, HalError::InvalidState(_)));
    assert_eq!(err.errno(), -22);
    assert_eq!(device.reference_count(), 0);
    assert_eq!(Calls::get(&calls.stop), 0);

    device.start().unwrap();
    assert_eq!(device.reference_count(), 1);
}

// ============================================================================
// 2. Failure atomicity
// ============================================================================

#[test]
fn test_failed_open_stays_closed() {
    let (device, calls) = counting_device();
    calls.fail_open.store(true, Ordering::SeqCst);

    assert!(matches!(
        device.open(),
        Err(HalError::BackendFailure { code: -16, .. })
    ));
    assert_eq!(device.state(), LifecycleState::Closed);

    calls.fail_open.store(false, Ordering::SeqCst);
    device.open().unwrap();
    assert_eq!(Calls::get(&calls.created), 2);
    assert_eq!(device.state(), LifecycleState::Opened);
}

#[test]
fn test_failed_first_start_leaves_count_and_route_unchanged() {
    let (device, calls) = counting_device();
    device.open().unwrap();
    calls.fail_start.store(true, Ordering::SeqCst);

    let err = device.start().unwrap_err();
    assert_eq!(err.errno(), -32);
    assert_eq!(device.reference_count(), 0);
    assert_eq!(device.state(), LifecycleState::Opened);
    assert_eq!(Calls::get(&calls.enable), 1);
    assert_eq!(Calls::get(&calls.disable), 1);

    calls.fail_start.store(false, Ordering::SeqCst);
    device.start().unwrap();
    assert_eq!(device.reference_count(), 1);
}

#[test]
fn test_failed_close_keeps_backend() {
    let (device, calls) = counting_device();
    device.open().unwrap();
    calls.fail_close.store(true, Ordering::SeqCst);

    assert!(device.close().is_err());
    assert!(device.is_initialized());

    calls.fail_close.store(false, Ordering::SeqCst);
    device.close().unwrap();
    assert!(!device.is_initialized());
}

#[test]
fn test_start_failure_rolls_back_route() {
    let mut backend = MockBackend::new();
    backend.expect_open().times(1).returning(|_, _| Ok(()));
    backend.expect_prepare().times(1).returning(|| Ok(()));
    backend
        .expect_start()
        .times(1)
        .returning(|| Err(HalError::backend("start", -110)));
    backend.expect_stop().never();

    let mut route = MockRoute::new();
    route
        .expect_enable_device()
        .withf(|name| name == "out_speaker")
        .times(1)
        .returning(|_| Ok(()));
    route
        .expect_disable_device()
        .withf(|name| name == "out_speaker")
        .times(1)
        .returning(|_| Ok(()));

    let device = mocked_device(backend, route);
    device.open().unwrap();

    assert!(matches!(
        device.start(),
        Err(HalError::BackendFailure { operation: "start", .. })
    ));
    assert_eq!(device.reference_count(), 0);
}

#[test]
fn test_route_enable_failure_skips_backend() {
    let mut backend = MockBackend::new();
    backend.expect_open().times(1).returning(|_, _| Ok(()));
    backend.expect_prepare().never();
    backend.expect_start().never();

    let mut route = MockRoute::new();
    route
        .expect_enable_device()
        .times(1)
        .returning(|_| Err(HalError::not_found("mixer path", "out_speaker")));
    route.expect_disable_device().never();

    let device = mocked_device(backend, route);
    device.open().unwrap();

    assert!(matches!(device.start(), Err(HalError::NotFound { .. })));
    assert_eq!(device.state(), LifecycleState::Opened);
}

#[test]
fn test_last_stop_stops_backend_then_disables_route() {
    let mut seq = mockall::Sequence::new();
    let mut backend = MockBackend::new();
    let mut route = MockRoute::new();

    backend.expect_open().times(1).returning(|_, _| Ok(()));
    route
        .expect_enable_device()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    backend
        .expect_prepare()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    backend
        .expect_start()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    backend
        .expect_stop()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    route
        .expect_disable_device()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let device = mocked_device(backend, route);
    device.open().unwrap();
    device.start().unwrap();
    device.start().unwrap();
    device.stop().unwrap();
    device.stop().unwrap();
    assert_eq!(device.state(), LifecycleState::Opened);
}

#[test]
fn test_failed_backend_stop_keeps_stream_count() {
    let mut backend = MockBackend::new();
    backend.expect_open().returning(|_, _| Ok(()));
    backend.expect_prepare().returning(|| Ok(()));
    backend.expect_start().returning(|| Ok(()));
    backend
        .expect_stop()
        .times(1)
        .returning(|| Err(HalError::backend("stop", -5)));

    let mut route = MockRoute::new();
    route.expect_enable_device().returning(|_| Ok(()));
    route.expect_disable_device().never();

    let device = mocked_device(backend, route);
    device.open().unwrap();
    device.start().unwrap();

    assert!(device.stop().is_err());
    assert_eq!(device.reference_count(), 1);
}

// ============================================================================
// 3. Concurrency
// ============================================================================

#[test]
fn test_concurrent_start_activates_once() {
    let num_threads = 16;
    let (device, calls) = counting_device();
    device.open().unwrap();

    let barrier = Arc::new(Barrier::new(num_threads));
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let device = Arc::clone(&device);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                device.start()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(device.reference_count(), num_threads as u32);
    assert_eq!(Calls::get(&calls.start), 1);
    assert_eq!(Calls::get(&calls.prepare), 1);
    assert_eq!(Calls::get(&calls.enable), 1);
}

#[test]
fn test_concurrent_stop_deactivates_once() {
    let num_threads = 16;
    let (device, calls) = counting_device();
    device.open().unwrap();
    for _ in 0..num_threads {
        device.start().unwrap();
    }

    let barrier = Arc::new(Barrier::new(num_threads));
    let handles: Vec<_> = (0..num_threads)
        .map(|_| {
            let device = Arc::clone(&device);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                device.stop()
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(device.reference_count(), 0);
    assert_eq!(Calls::get(&calls.stop), 1);
    assert_eq!(Calls::get(&calls.disable), 1);
}

// ============================================================================
// 4. Properties
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Op {
    Start,
    Stop,
    Close,
}

fn arbitrary_ops() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![Just(Op::Start), Just(Op::Stop), Just(Op::Close)],
        0..64,
    )
}

proptest! {
    /// Property: n starts followed by n stops cost one activation and one deactivation
    #[test]
    fn start_stop_pairs_activate_once(n in 1usize..64) {
        let (device, calls) = counting_device();
        device.open().unwrap();

        for _ in 0..n {
            device.start().unwrap();
        }
        for _ in 0..n {
            device.stop().unwrap();
        }

        prop_assert_eq!(device.reference_count(), 0);
        prop_assert_eq!(Calls::get(&calls.start), 1);
        prop_assert_eq!(Calls::get(&calls.stop), 1);
    }

    /// Property: the reference count follows a saturating counter model
    #[test]
    fn reference_count_matches_model(ops in arbitrary_ops()) {
        let (device, calls) = counting_device();
        device.open().unwrap();
        let mut expected: u32 = 0;

        for op in ops {
            match op {
                Op::Start => {
                    device.start().unwrap();
                    expected += 1;
                }
                Op::Stop => {
                    let result = device.stop();
                    if expected == 0 {
                        prop_assert!(matches!(result, Err(HalError::InvalidState(_))));
                    } else {
                        prop_assert!(result.is_ok());
                        expected -= 1;
                    }
                }
                Op::Close => {
                    device.close().unwrap();
                    if expected == 0 {
                        device.open().unwrap();
                    }
                }
            }
            prop_assert_eq!(device.reference_count(), expected);
            prop_assert!(device.is_initialized());
        }

        // Hardware is running exactly when some stream holds the device.
        let running = Calls::get(&calls.start) - Calls::get(&calls.stop);
        prop_assert_eq!(running, usize::from(expected > 0));
    }
}

// ============================================================================
// 5. Registry
// ============================================================================

fn counting_registry() -> (DeviceRegistry, Arc<Calls>) {
    let calls = Arc::new(Calls::default());
    let resources = Arc::new(Resources {
        route: Arc::new(CountingRoute {
            calls: Arc::clone(&calls),
        }),
    });
    let factory = Arc::new(CountingFactory {
        calls: Arc::clone(&calls),
    });
    (DeviceRegistry::new(resources, factory), calls)
}

#[test]
fn test_registry_shares_capture_codec() {
    let (registry, _) = counting_registry();

    let handset = registry
        .get_or_create(&DeviceAttributes::new(DeviceId::InHandsetMic))
        .unwrap();
    let quad = registry
        .get_or_create(&DeviceAttributes::new(DeviceId::InQuadMic))
        .unwrap();
    let speaker = registry
        .get_or_create(&DeviceAttributes::new(DeviceId::OutSpeaker))
        .unwrap();

    assert!(Arc::ptr_eq(&handset, &quad));
    assert!(!Arc::ptr_eq(&handset, &speaker));
    assert_eq!(quad.id(), DeviceId::InHandsetMic);
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_registry_rejects_usb_ids() {
    let (registry, _) = counting_registry();
    assert!(matches!(
        registry.get_or_create(&DeviceAttributes::new(DeviceId::OutUsbHeadset)),
        Err(HalError::Unsupported(_))
    ));
    assert!(registry.is_empty());
}

#[test]
fn test_registry_release_keeps_holders_alive() {
    let (registry, calls) = counting_registry();
    let speaker = registry
        .get_or_create(&DeviceAttributes::new(DeviceId::OutSpeaker))
        .unwrap();
    speaker.open().unwrap();
    speaker.start().unwrap();

    assert!(registry.release(DeviceId::OutSpeaker).unwrap());
    assert!(!registry.release(DeviceId::OutSpeaker).unwrap());
    assert!(registry.get(DeviceId::OutSpeaker).is_none());

    // The stream still holding the instance can finish normally.
    speaker.stop().unwrap();
    speaker.close().unwrap();
    assert_eq!(Calls::get(&calls.close), 1);

    let fresh = registry
        .get_or_create(&DeviceAttributes::new(DeviceId::OutSpeaker))
        .unwrap();
    assert!(!Arc::ptr_eq(&speaker, &fresh));
    assert_eq!(fresh.state(), LifecycleState::Closed);
}
