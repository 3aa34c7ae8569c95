mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use flowsort_core::controller::valves::{bubble_blow, bubble_suck, clear_tubes, safe, ValveCommand};
use flowsort_core::controller::{run_maintenance, ControlHandle, Maintenance};
use flowsort_core::error::{Result, SortError};
use flowsort_core::hardware::{Clock, ValveActuator};

use common::{ManualClock, Rig};

/// Records command sets and requests a stop after `stop_after` of them.
struct StoppingValves {
    log: Arc<Mutex<Vec<Vec<ValveCommand>>>>,
    control: ControlHandle,
    stop_after: usize,
}

impl ValveActuator for StoppingValves {
    fn execute(&mut self, commands: &[ValveCommand]) -> Result<()> {
        let mut log = self.log.lock().unwrap();
        log.push(commands.to_vec());
        if log.len() >= self.stop_after {
            self.control.stop();
        }
        Ok(())
    }
}

struct BrokenValves;

impl ValveActuator for BrokenValves {
    fn execute(&mut self, _commands: &[ValveCommand]) -> Result<()> {
        Err(SortError::Actuation("serial port closed".into()))
    }
}

#[test]
fn test_bubble_cycles_alternate_and_end_safe() {
    let rig = Rig::new();
    let mut valves = rig.devices().valves;
    let task = Maintenance::ClearBubbles {
        cycles: Some(2),
        half_cycle: Duration::from_secs(1),
    };

    let report = run_maintenance(task, valves.as_mut(), rig.clock.as_ref(), &rig.control).unwrap();

    assert_eq!(report.cycles, 2);
    assert!(!report.interrupted);
    let log = rig.valves.lock().unwrap().clone();
    assert_eq!(
        log,
        vec![bubble_blow(), bubble_suck(), bubble_blow(), bubble_suck(), safe()]
    );
    assert_eq!(rig.clock.now(), Duration::from_secs(4));
}

#[test]
fn test_open_ended_bubbles_run_until_stopped() {
    let clock = ManualClock::new();
    let control = ControlHandle::new();
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut valves = StoppingValves {
        log: log.clone(),
        control: control.clone(),
        stop_after: 5,
    };
    let task = Maintenance::ClearBubbles {
        cycles: None,
        half_cycle: Duration::from_secs(1),
    };

    let report = run_maintenance(task, &mut valves, &clock, &control).unwrap();

    // Stopped while the fifth set (a blow) was held.
    assert_eq!(report.cycles, 2);
    assert!(report.interrupted);
    let log = log.lock().unwrap();
    assert_eq!(log.len(), 6);
    assert_eq!(log[4], bubble_blow());
    assert_eq!(log.last(), Some(&safe()));
}

#[test]
fn test_stopped_before_start_only_sets_safe() {
    let rig = Rig::new();
    rig.control.stop();
    let mut valves = rig.devices().valves;
    let task = Maintenance::ClearBubbles {
        cycles: Some(3),
        half_cycle: Duration::from_secs(1),
    };

    let report = run_maintenance(task, valves.as_mut(), rig.clock.as_ref(), &rig.control).unwrap();

    assert_eq!(report.cycles, 0);
    assert!(report.interrupted);
    assert_eq!(rig.valves.lock().unwrap().clone(), vec![safe()]);
}

#[test]
fn test_clear_tubes_holds_pressure_then_sets_safe() {
    let rig = Rig::new();
    let mut valves = rig.devices().valves;
    let task = Maintenance::ClearTubes {
        duration: Duration::from_millis(2_500),
    };

    let report = run_maintenance(task, valves.as_mut(), rig.clock.as_ref(), &rig.control).unwrap();

    assert_eq!(report, Default::default());
    assert_eq!(rig.valves.lock().unwrap().clone(), vec![clear_tubes(), safe()]);
    assert_eq!(rig.clock.now(), Duration::from_millis(2_500));
}

#[test]
fn test_actuation_fault_is_returned() {
    let clock = ManualClock::new();
    let task = Maintenance::ClearTubes {
        duration: Duration::from_secs(1),
    };
    let err = run_maintenance(task, &mut BrokenValves, &clock, &ControlHandle::new()).unwrap_err();
    assert!(err.is_hardware_fault());
}
