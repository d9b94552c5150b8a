pub const SLOT_COUNT: usize = 2;

pub const UNKNOWN_DESTINATION: &str = "Unbekannt";
pub const UNKNOWN_LINE: &str = "???";
pub const NO_TIME: &str = "--:--";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DepartureRecord {
    pub train_type: String,
    pub train_name: String,
    pub destination: String,
    pub scheduled_time: String,
    pub estimated_time: String,
    pub platform: String,
    pub info_line: String,
    pub is_delayed: bool,
    pub delay_minutes: i64,
    pub valid: bool,

    // Written by the renderer only.
    pub scroll_offset: i32,
    pub needs_scrolling: bool,
}

impl DepartureRecord {
    pub fn empty() -> DepartureRecord {
        return DepartureRecord::default();
    }

    /// "R 53", or just "R" for lines without a number.
    pub fn train_label(&self) -> String {
        if self.train_name.is_empty() {
            return self.train_type.clone();
        }
        return format!("{} {}", self.train_type, self.train_name);
    }

    pub fn wants_scroll_tick(&self) -> bool {
        return self.valid && !self.info_line.is_empty() && self.needs_scrolling;
    }
}

pub type Slots = [DepartureRecord; SLOT_COUNT];

pub fn empty_slots() -> Slots {
    return [DepartureRecord::empty(), DepartureRecord::empty()];
}

pub fn invalidate_all(slots: &mut Slots) {
    for record in slots.iter_mut() {
        record.valid = false;
    }
}

pub fn valid_count(slots: &Slots) -> usize {
    return slots.iter().filter(|r| r.valid).count();
}
