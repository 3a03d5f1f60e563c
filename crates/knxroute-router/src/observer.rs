use std::sync::Arc;

use knxroute_core::LBusmonitor;

/// Receiver of raw bus observations.
pub trait BusmonitorObserver: Send + Sync {
    fn send_l_busmonitor(&self, frame: &LBusmonitor);
}

/// Plain and verbose busmonitor taps.
///
/// Plain observers see what links report from the medium. Verbose observers
/// additionally see a synthesized record of every frame the router forwards.
#[derive(Default)]
pub struct ObserverRegistry {
    plain: Vec<Arc<dyn BusmonitorObserver>>,
    verbose: Vec<Arc<dyn BusmonitorObserver>>,
}

impl ObserverRegistry {
    pub fn register_busmonitor(&mut self, observer: Arc<dyn BusmonitorObserver>) -> bool {
        add(&mut self.plain, observer)
    }

    pub fn register_vbusmonitor(&mut self, observer: Arc<dyn BusmonitorObserver>) -> bool {
        add(&mut self.verbose, observer)
    }

    pub fn deregister_busmonitor(&mut self, observer: &Arc<dyn BusmonitorObserver>) -> bool {
        remove(&mut self.plain, observer)
    }

    pub fn deregister_vbusmonitor(&mut self, observer: &Arc<dyn BusmonitorObserver>) -> bool {
        remove(&mut self.verbose, observer)
    }

    pub fn has_busmonitor(&self) -> bool {
        !self.plain.is_empty()
    }

    pub fn has_vbusmonitor(&self) -> bool {
        !self.verbose.is_empty()
    }

    /// Fans out a record that came from the medium.
    pub fn deliver_observed(&self, frame: &LBusmonitor) {
        for observer in self.plain.iter().chain(&self.verbose) {
            observer.send_l_busmonitor(frame);
        }
    }

    /// Fans out a record synthesized from a forwarded frame.
    pub fn deliver_synthesized(&self, frame: &LBusmonitor) {
        for observer in &self.verbose {
            observer.send_l_busmonitor(frame);
        }
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("plain", &self.plain.len())
            .field("verbose", &self.verbose.len())
            .finish()
    }
}

fn same_observer(a: &Arc<dyn BusmonitorObserver>, b: &Arc<dyn BusmonitorObserver>) -> bool {
    // Compare data pointers only; vtables for one type may differ.
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

fn add(list: &mut Vec<Arc<dyn BusmonitorObserver>>, observer: Arc<dyn BusmonitorObserver>) -> bool {
    if list.iter().any(|known| same_observer(known, &observer)) {
        return false;
    }
    list.push(observer);
    true
}

fn remove(list: &mut Vec<Arc<dyn BusmonitorObserver>>, observer: &Arc<dyn BusmonitorObserver>) -> bool {
    match list.iter().position(|known| same_observer(known, observer)) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{BusmonitorObserver, ObserverRegistry};
    use knxroute_core::LBusmonitor;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Tap(Mutex<usize>);

    impl BusmonitorObserver for Tap {
        fn send_l_busmonitor(&self, _frame: &LBusmonitor) {
            *self.0.lock().unwrap() += 1;
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = ObserverRegistry::default();
        let tap: Arc<dyn BusmonitorObserver> = Arc::new(Tap::default());
        assert!(registry.register_busmonitor(tap.clone()));
        assert!(!registry.register_busmonitor(tap.clone()));
        assert!(registry.register_vbusmonitor(tap.clone()));
        assert!(registry.deregister_busmonitor(&tap));
        assert!(!registry.deregister_busmonitor(&tap));
        assert!(registry.has_vbusmonitor());
        assert!(!registry.has_busmonitor());
    }

    #[test]
    fn synthesized_records_reach_only_verbose_taps() {
        let mut registry = ObserverRegistry::default();
        let plain = Arc::new(Tap::default());
        let verbose = Arc::new(Tap::default());
        registry.register_busmonitor(plain.clone());
        registry.register_vbusmonitor(verbose.clone());

        let record = LBusmonitor::raw([0x29, 0x00]);
        registry.deliver_observed(&record);
        registry.deliver_synthesized(&record);

        assert_eq!(*plain.0.lock().unwrap(), 1);
        assert_eq!(*verbose.0.lock().unwrap(), 2);
    }
}
