use core::cell::RefCell;
use critical_section::Mutex;


/**
    value shared between interrupt handlers and the main line

    every access runs inside a critical section, so an interrupt can never observe it half updated. Closures passed to [Self::lock] must stay short: interrupts are held back while they run.
*/
pub struct IrqMutex<T> {
    value: Mutex<RefCell<T>>,
}
impl<T> IrqMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {value: Mutex::new(RefCell::new(value))}
    }
    /// run the given closure with exclusive access to the value
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| f(&mut self.value.borrow_ref_mut(cs)))
    }
}
