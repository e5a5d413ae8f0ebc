/*!
    bus role state machine

    the node starts as a passive slave. After enough silent transmission windows it takes the bus as master (if automatic mode allows it), and it steps back to slave as soon as another master's call is heard.
*/


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    /// answering our own calls, counting silent cycles
    SlaveListening {
        silence: u8,
        /// our join request was already sent to the current master
        joined: bool,
    },
    /// a master is polling us, the join request goes out in our next window
    SlaveInitializing {silence: u8},
    /// we issue the call bytes
    MasterPolling,
}

/// what the station observed during one update
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// one transmission window passed without any call for us
    Silence,
    /// a call addressed to us, or a broadcast
    Called,
    /// our join request left the outbound buffer
    Joined,
    /// a call byte from another master
    Contention,
}

/// parameters of role changes
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Policy {
    /// allow taking the bus when no master is heard
    pub auto: bool,
    /// silent cycles before taking the bus
    pub threshold: u8,
}

impl Default for Role {
    fn default() -> Self {
        Self::SlaveListening {silence: 0, joined: false}
    }
}

impl Role {
    pub fn is_master(&self) -> bool {
        matches!(self, Self::MasterPolling)
    }
    /// pure transition function
    pub fn next(self, event: Event, policy: Policy) -> Self {
        match (self, event) {
            (Self::MasterPolling, Event::Contention) => Self::SlaveListening {silence: 0, joined: false},
            (Self::MasterPolling, _) => self,

            (Self::SlaveListening {silence, joined}, Event::Silence) => {
                let silence = silence.saturating_add(1);
                if policy.auto && silence >= policy.threshold
                    {Self::MasterPolling}
                else
                    {Self::SlaveListening {silence, joined}}
            },
            (Self::SlaveListening {joined: true, ..}, Event::Called) => Self::SlaveListening {silence: 0, joined: true},
            (Self::SlaveListening {joined: false, ..}, Event::Called) => Self::SlaveInitializing {silence: 0},
            (Self::SlaveListening {..}, _) => self,

            (Self::SlaveInitializing {silence}, Event::Silence) => {
                let silence = silence.saturating_add(1);
                if policy.auto && silence >= policy.threshold
                    {Self::MasterPolling}
                else
                    {Self::SlaveInitializing {silence}}
            },
            (Self::SlaveInitializing {..}, Event::Called) => Self::SlaveInitializing {silence: 0},
            (Self::SlaveInitializing {..}, Event::Joined) => Self::SlaveListening {silence: 0, joined: true},
            (Self::SlaveInitializing {..}, Event::Contention) => self,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    const AUTO: Policy = Policy {auto: true, threshold: 4};

    #[test]
    fn silence_promotes_to_master_once() {
        let mut role = Role::default();
        let mut promotions = 0;
        for _ in 0 .. 20 {
            let next = role.next(Event::Silence, AUTO);
            if next.is_master() && !role.is_master() {
                promotions += 1;
            }
            role = next;
        }
        assert_eq!(promotions, 1);
        assert_eq!(role, Role::MasterPolling);
    }

    #[test]
    fn promotion_needs_full_threshold() {
        let mut role = Role::default();
        for _ in 0 .. 3 {
            role = role.next(Event::Silence, AUTO);
        }
        assert_eq!(role, Role::SlaveListening {silence: 3, joined: false});
        role = role.next(Event::Silence, AUTO);
        assert!(role.is_master());
    }

    #[test]
    fn manual_mode_stays_slave() {
        let manual = Policy {auto: false, threshold: 4};
        let mut role = Role::default();
        for _ in 0 .. 1000 {
            role = role.next(Event::Silence, manual);
        }
        assert!(!role.is_master());
    }

    #[test]
    fn calls_reset_silence_and_join() {
        let mut role = Role::default();
        role = role.next(Event::Silence, AUTO).next(Event::Silence, AUTO);
        role = role.next(Event::Called, AUTO);
        assert_eq!(role, Role::SlaveInitializing {silence: 0});
        role = role.next(Event::Joined, AUTO);
        assert_eq!(role, Role::SlaveListening {silence: 0, joined: true});
        role = role.next(Event::Silence, AUTO).next(Event::Called, AUTO);
        assert_eq!(role, Role::SlaveListening {silence: 0, joined: true});
    }

    #[test]
    fn contention_demotes_master() {
        let role = Role::MasterPolling.next(Event::Called, AUTO);
        assert!(role.is_master());
        let role = role.next(Event::Contention, AUTO);
        assert_eq!(role, Role::default());
    }
}
