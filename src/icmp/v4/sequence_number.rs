type SequenceNumberInnerType = u16;

/// ICMP echo sequence number. Wraps around at 2^16.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub(crate) struct SequenceNumber(SequenceNumberInnerType);

impl SequenceNumber {
    pub(crate) fn start_value() -> SequenceNumber {
        // ICMPv4 sequence numbers start from 1.
        SequenceNumber(1)
    }

    pub(crate) fn next(self) -> Self {
        SequenceNumber(self.0.wrapping_add(1))
    }
}

impl From<SequenceNumber> for SequenceNumberInnerType {
    fn from(value: SequenceNumber) -> Self {
        value.0
    }
}

impl From<SequenceNumberInnerType> for SequenceNumber {
    fn from(value: SequenceNumberInnerType) -> Self {
        SequenceNumber(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_increments() {
        assert_eq!(SequenceNumber::from(8), SequenceNumber::from(7).next());
    }

    #[test]
    fn next_wraps_around_at_u16_max() {
        let last = SequenceNumber::from(u16::MAX);
        assert_eq!(SequenceNumber::from(0), last.next());
        assert_eq!(SequenceNumber::from(1), last.next().next());
    }
}
