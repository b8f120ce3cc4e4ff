use std::time::Duration;

/// `heart-beat` header pair: `client_ms` is how often this side can send,
/// `server_ms` is how often it wants to hear from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeartBeat {
    pub client_ms: u32,
    pub server_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NegotiatedHeartBeat {
    pub send_ms: u32,
    pub receive_ms: u32,
}

impl HeartBeat {
    pub fn new(client_ms: u32, server_ms: u32) -> Self {
        Self { client_ms, server_ms }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.split(',').map(|part| part.trim().parse::<u32>());
        let client_ms = parts.next()?.ok()?;
        let server_ms = parts.next()?.ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self { client_ms, server_ms })
    }

    pub fn to_header_value(&self) -> String {
        format!("{},{}", self.client_ms, self.server_ms)
    }

    /// Agrees on intervals with what the server announced in `CONNECTED`.
    pub fn negotiate(&self, server: HeartBeat) -> NegotiatedHeartBeat {
        NegotiatedHeartBeat {
            send_ms: select_interval(self.client_ms, server.server_ms),
            receive_ms: select_interval(server.client_ms, self.server_ms),
        }
    }
}

impl NegotiatedHeartBeat {
    pub fn send_interval(&self) -> Option<Duration> {
        (self.send_ms > 0).then(|| Duration::from_millis(self.send_ms as u64))
    }

    pub fn receive_interval(&self) -> Option<Duration> {
        (self.receive_ms > 0).then(|| Duration::from_millis(self.receive_ms as u64))
    }
}

fn select_interval(offered_ms: u32, wanted_ms: u32) -> u32 {
    if offered_ms == 0 || wanted_ms == 0 {
        0
    } else {
        offered_ms.max(wanted_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::HeartBeat;

    #[test]
    fn negotiation_takes_the_larger_interval() {
        let client = HeartBeat::new(1000, 1000);
        let negotiated = client.negotiate(HeartBeat::new(5000, 2000));
        assert_eq!(negotiated.send_ms, 2000);
        assert_eq!(negotiated.receive_ms, 5000);
    }

    #[test]
    fn zero_on_either_side_disables_direction() {
        let client = HeartBeat::new(0, 1000);
        let negotiated = client.negotiate(HeartBeat::new(0, 4000));
        assert_eq!(negotiated.send_ms, 0);
        assert_eq!(negotiated.receive_ms, 0);
        assert!(negotiated.send_interval().is_none());
    }

    #[test]
    fn parse_rejects_malformed_values() {
        assert_eq!(HeartBeat::parse("10, 20"), Some(HeartBeat::new(10, 20)));
        assert!(HeartBeat::parse("10").is_none());
        assert!(HeartBeat::parse("10,20,30").is_none());
        assert!(HeartBeat::parse("a,b").is_none());
    }
}
