use crate::game::types::normalize_angle;
use tokio::sync::watch;

/// Desired heading and boost state, published by the input collaborator at
/// device rate and sampled by the session loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InputSignal {
    pub angle: f64,
    pub boost: bool,
}

impl Default for InputSignal {
    fn default() -> Self {
        Self {
            angle: 0.0,
            boost: false,
        }
    }
}

#[derive(Debug)]
pub struct InputHandle {
    tx: watch::Sender<InputSignal>,
}

impl InputHandle {
    pub fn publish(&self, angle: f64, boost: bool) {
        let _ = self.tx.send(InputSignal {
            angle: normalize_angle(angle),
            boost,
        });
    }
}

pub fn channel() -> (InputHandle, watch::Receiver<InputSignal>) {
    let (tx, rx) = watch::channel(InputSignal::default());
    (InputHandle { tx }, rx)
}
