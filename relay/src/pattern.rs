//! Significance-masked message matching.

use crate::message::Message;

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Selects which message fields a match test compares.
///
/// An empty mask ([`Significance::NONE`]) matches every message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Significance(u8);

impl Significance {
  /// Compare nothing: wildcard receive.
  pub const NONE: Self = Self(0);
  /// Compare `kind`.
  pub const TYPE: Self = Self(1 << 0);
  /// Compare `key`.
  pub const INTEGRAL: Self = Self(1 << 1);
  /// Compare the runtime type of the payload (not its value).
  pub const PAYLOAD_TYPE: Self = Self(1 << 2);
  /// Compare every field.
  pub const ALL: Self = Self(Self::TYPE.0 | Self::INTEGRAL.0 | Self::PAYLOAD_TYPE.0);

  #[inline]
  pub const fn bits(self) -> u8 {
    self.0
  }

  /// Builds a mask from raw bits, discarding unknown ones.
  #[inline]
  pub const fn from_bits_truncate(bits: u8) -> Self {
    Self(bits & Self::ALL.0)
  }

  #[inline]
  pub const fn contains(self, other: Self) -> bool {
    self.0 & other.0 == other.0
  }

  #[inline]
  pub const fn is_empty(self) -> bool {
    self.0 == 0
  }
}

impl BitOr for Significance {
  type Output = Self;

  #[inline]
  fn bitor(self, rhs: Self) -> Self {
    Self(self.0 | rhs.0)
  }
}

impl BitOrAssign for Significance {
  #[inline]
  fn bitor_assign(&mut self, rhs: Self) {
    self.0 |= rhs.0;
  }
}

impl BitAnd for Significance {
  type Output = Self;

  #[inline]
  fn bitand(self, rhs: Self) -> Self {
    Self(self.0 & rhs.0)
  }
}

impl fmt::Debug for Significance {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_empty() {
      return f.write_str("Significance(NONE)");
    }
    let names = [
      (Self::TYPE, "TYPE"),
      (Self::INTEGRAL, "INTEGRAL"),
      (Self::PAYLOAD_TYPE, "PAYLOAD_TYPE"),
    ];
    f.write_str("Significance(")?;
    let mut first = true;
    for (flag, name) in names {
      if self.contains(flag) {
        if !first {
          f.write_str(" | ")?;
        }
        f.write_str(name)?;
        first = false;
      }
    }
    f.write_str(")")
  }
}

/// Tests `candidate` against `prototype`, comparing only the fields selected
/// by `significance`.
#[inline]
pub fn matches(candidate: &Message, prototype: &Message, significance: Significance) -> bool {
  if significance.contains(Significance::TYPE) && candidate.kind() != prototype.kind() {
    return false;
  }

  if significance.contains(Significance::INTEGRAL) && candidate.key() != prototype.key() {
    return false;
  }

  if significance.contains(Significance::PAYLOAD_TYPE)
    && candidate.payload_type_id() != prototype.payload_type_id()
  {
    return false;
  }

  true
}

#[cfg(test)]
mod tests {
  use super::*;

  const MASKS: [Significance; 8] = [
    Significance::from_bits_truncate(0),
    Significance::from_bits_truncate(1),
    Significance::from_bits_truncate(2),
    Significance::from_bits_truncate(3),
    Significance::from_bits_truncate(4),
    Significance::from_bits_truncate(5),
    Significance::from_bits_truncate(6),
    Significance::from_bits_truncate(7),
  ];

  fn candidates() -> Vec<Message> {
    vec![
      Message::new(5, 42, String::from("x")),
      Message::new(5, 42, 1u32),
      Message::new(5, 43, String::from("y")),
      Message::new(6, 42, String::from("z")),
      Message::without_payload(5, 42),
    ]
  }

  #[test]
  fn wildcard_matches_everything() {
    let proto = Message::new(1, 1, ());
    for c in candidates() {
      assert!(matches(&c, &proto, Significance::NONE));
    }
    assert!(matches(&Message::empty(), &proto, Significance::NONE));
  }

  #[test]
  fn matches_is_conjunction_of_selected_fields() {
    let all = candidates();
    for candidate in &all {
      for prototype in &all {
        for mask in MASKS {
          let expected = (!mask.contains(Significance::TYPE) || candidate.kind() == prototype.kind())
            && (!mask.contains(Significance::INTEGRAL) || candidate.key() == prototype.key())
            && (!mask.contains(Significance::PAYLOAD_TYPE)
              || candidate.payload_type_id() == prototype.payload_type_id());
          assert_eq!(
            matches(candidate, prototype, mask),
            expected,
            "candidate {:?} prototype {:?} mask {:?}",
            candidate,
            prototype,
            mask
          );
        }
      }
    }
  }

  #[test]
  fn payload_values_are_not_compared() {
    let a = Message::new(5, 42, String::from("left"));
    let b = Message::new(5, 42, String::from("right"));
    assert!(matches(&a, &b, Significance::ALL));
    let c = Message::new(5, 42, 7i64);
    assert!(!matches(&a, &c, Significance::ALL));
    assert!(matches(&a, &c, Significance::TYPE | Significance::INTEGRAL));
  }

  #[test]
  fn mask_ops_and_debug() {
    let mut m = Significance::TYPE;
    m |= Significance::PAYLOAD_TYPE;
    assert!(m.contains(Significance::TYPE));
    assert!(!m.contains(Significance::INTEGRAL));
    assert_eq!(m & Significance::TYPE, Significance::TYPE);
    assert_eq!(Significance::from_bits_truncate(0xff), Significance::ALL);
    assert_eq!(format!("{:?}", m), "Significance(TYPE | PAYLOAD_TYPE)");
    assert_eq!(format!("{:?}", Significance::NONE), "Significance(NONE)");
  }
}
