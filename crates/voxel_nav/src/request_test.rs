use super::*;
use crate::collision::OpenSpace;
use crate::error::NavError;
use crate::test_utils::*;

fn volume_with_region(oracle: impl crate::collision::CollisionOracle + 'static) -> (Arc<NavVolume>, RegionId) {
  let volume = Arc::new(NavVolume::new(standard_params()));
  let region = RegionId::new();
  volume.add_dynamic_region(region, scattered_region());
  volume.set_oracle(shared(oracle));
  volume.generate().unwrap();
  (volume, region)
}

fn request(volume: &Arc<NavVolume>, start: DVec3, goal: DVec3) -> Arc<RequestState> {
  Arc::new(RequestState::new(
    1,
    RequestPriority::High,
    Arc::clone(volume),
    start,
    goal,
    PathfinderSettings::default(),
    Weak::new(),
    None,
  ))
}

const A: DVec3 = DVec3::new(-300.0, -300.0, -300.0);
const B: DVec3 = DVec3::new(300.0, 300.0, 300.0);

#[test]
fn test_completes_with_scratch_result() {
  let (volume, _) = volume_with_region(OpenSpace);
  let metrics = LoadMetrics::new();
  let state = request(&volume, A, B);
  let future = PathFuture::new(Arc::clone(&state));
  assert_eq!(future.status(), PathFindStatus::Pending);
  assert!(!future.is_resolved());

  metrics.request_queued();
  execute(&state, &metrics);

  assert_eq!(future.wait(), PathFindStatus::Complete);
  let path = state.take_result().unwrap();
  assert!(path.is_ready());
  assert!(state.take_result().is_none(), "result moves out once");
  assert_eq!(metrics.snapshot().completed, 1);
  assert_eq!(metrics.pending_pathfinds(), 0);
  assert!(future.error_message().is_none());
}

/// A region regenerated between submission and completion invalidates the
/// request even without any listener.
#[test]
fn test_region_bump_before_completion_invalidates() {
  let (volume, region) = volume_with_region(scattered_obstacles());
  let metrics = LoadMetrics::new();
  let state = request(&volume, A, B);
  assert_eq!(state.snapshot.entries.as_slice(), &[(region, 0)]);

  volume.regenerate_region_with(region, &OpenSpace).unwrap();
  metrics.request_queued();
  execute(&state, &metrics);

  assert_eq!(state.status(), PathFindStatus::Invalidated);
  assert!(state.take_result().is_none(), "no partial delivery");
  assert_eq!(metrics.snapshot().invalidated, 1);
}

#[test]
fn test_cancel_before_start() {
  let (volume, _) = volume_with_region(OpenSpace);
  let metrics = LoadMetrics::new();
  let state = request(&volume, A, B);
  let future = PathFuture::new(Arc::clone(&state));
  future.cancel();

  metrics.request_queued();
  execute(&state, &metrics);
  assert_eq!(future.wait(), PathFindStatus::Cancelled);
  let snap = metrics.snapshot();
  assert_eq!((snap.cancelled, snap.pending_pathfinds, snap.active_pathfinds), (1, 0, 0));
}

#[test]
fn test_invalidated_before_start() {
  let (volume, region) = volume_with_region(OpenSpace);
  let state = request(&volume, A, B);
  assert!(state.depends_on(&[region]));
  assert!(!state.depends_on(&[RegionId::new()]));

  state.invalidate();
  assert!(!state.is_current());
  execute(&state, &LoadMetrics::new());
  assert_eq!(state.status(), PathFindStatus::Invalidated);
}

#[test]
fn test_failure_carries_diagnostics() {
  let (volume, _) = volume_with_region(split_wall());
  let state = request(&volume, DVec3::new(-200.0, -200.0, 0.0), DVec3::new(200.0, 200.0, 0.0));
  let future = PathFuture::new(Arc::clone(&state));
  execute(&state, &LoadMetrics::new());

  assert_eq!(future.wait(), PathFindStatus::Failed);
  let info = future.failure_info().expect("search failures carry diagnostics");
  assert!(info.iterations > 0);
  assert!(future.error_message().is_some());
}

/// A panicking search still resolves, so waiters and the engine move on.
#[test]
fn test_panicking_search_resolves_failed() {
  let (volume, _) = volume_with_region(OpenSpace);
  let metrics = LoadMetrics::new();
  let state = request(&volume, A, B);
  let future = PathFuture::new(Arc::clone(&state));

  metrics.request_queued();
  execute_with(&state, &metrics, |_| -> NavResult<NavigationPath> { panic!("corrupt store") });

  assert_eq!(future.wait_timeout(Duration::from_secs(5)), Some(PathFindStatus::Failed));
  assert!(state.take_result().is_none());
  assert!(future.failure_info().is_none());
  assert_eq!(future.error_message().unwrap(), "path search panicked: corrupt store");
  let snap = metrics.snapshot();
  assert_eq!((snap.failed, snap.pending_pathfinds, snap.active_pathfinds), (1, 0, 0));
}

#[test]
fn test_unresolvable_start_fails_without_info() {
  let (volume, _) = volume_with_region(OpenSpace);
  let state = request(&volume, DVec3::splat(900.0), B);
  let future = PathFuture::new(Arc::clone(&state));
  execute(&state, &LoadMetrics::new());

  assert_eq!(future.status(), PathFindStatus::Failed);
  assert!(future.failure_info().is_none());
  let message = future.error_message().unwrap();
  assert_eq!(
    message,
    NavError::LinkResolutionFailure {
      position: DVec3::splat(900.0),
      reason: crate::error::LinkFailureReason::OutsideVolume,
    }
    .to_string()
  );
}

#[test]
fn test_wait_timeout_on_unresolved() {
  let (volume, _) = volume_with_region(OpenSpace);
  let future = PathFuture::new(request(&volume, A, B));
  assert_eq!(future.wait_timeout(Duration::from_millis(5)), None);
  assert_eq!(future.priority(), RequestPriority::High);
}

#[test]
fn test_terminal_states() {
  assert!(!PathFindStatus::Pending.is_terminal());
  assert!(!PathFindStatus::Active.is_terminal());
  for status in [
    PathFindStatus::Complete,
    PathFindStatus::Failed,
    PathFindStatus::Cancelled,
    PathFindStatus::Invalidated,
  ] {
    assert!(status.is_terminal());
    assert_eq!(PathFindStatus::from_u8(status as u8), status);
  }
  assert_eq!(RequestPriority::default(), RequestPriority::Normal);
}
