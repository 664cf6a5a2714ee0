//! Per-port automation curves: points, selection, clipboard, and the
//! value lookup consumers use to drive a DSP port.
//!
//! A real `AgsAutomation` keeps two `GList`s of the same ref-counted
//! `AgsAcceleration` objects (`acceleration` and `selection`), with a flag
//! on the shared object marking membership in the latter. Rust ownership
//! doesn't fit that shared-mutable-reference shape, so this collapses it
//! to one sorted `Vec<Acceleration>` where each point carries its own
//! `selected` flag: the value is set once and the flag toggles freely
//! (see DESIGN.md).

use std::cmp::Ordering as CmpOrdering;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::writer::Writer;
use quick_xml::Reader;

use crate::error::{Result, SoundcardError};
use crate::timestamp::Timestamp;
use crate::value::{PortValue, PortValueType};

/// Selection-range match tolerance: `(upper - lower) / MAXIMUM_STEPS`.
pub const MAXIMUM_STEPS: u32 = 251;
pub const DEFAULT_PRECISION: u32 = 8;

pub const CLIPBOARD_TYPE: &str = "ags-automation-clipboard";
pub const CLIPBOARD_VERSION: &str = "1.3.0";
pub const CLIPBOARD_FORMAT: &str = "ags-automation-native-scale";
const CLIPBOARD_LEGACY_VERSION: &str = "0.4.3";

/// A single (x, y) automation point with a mutable selection flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Acceleration {
    pub x: u32,
    pub y: f64,
    pub selected: bool,
}

impl Acceleration {
    pub fn new(x: u32, y: f64) -> Self {
        Self { x, y, selected: false }
    }

    fn sort_key(&self) -> (u32, u64) {
        (self.x, self.y.to_bits())
    }
}

fn acceleration_sort_func(a: &Acceleration, b: &Acceleration) -> CmpOrdering {
    a.sort_key().cmp(&b.sort_key())
}

/// Per-port control curve.
pub struct Automation {
    pub timestamp: Timestamp,
    pub channel_type: String,
    pub line: u32,
    pub control_name: String,
    pub steps: u32,
    pub lower: f64,
    pub upper: f64,
    pub default_value: f64,
    pub port_value_type: PortValueType,
    points: Vec<Acceleration>,
}

impl Automation {
    pub fn new(line: u32, channel_type: impl Into<String>, control_name: impl Into<String>) -> Self {
        Self {
            timestamp: Timestamp::default(),
            channel_type: channel_type.into(),
            line,
            control_name: control_name.into(),
            steps: DEFAULT_PRECISION,
            lower: 0.0,
            upper: 1.0,
            default_value: 0.0,
            port_value_type: PortValueType::Double,
            points: Vec::new(),
        }
    }

    /// Toggled ports get `steps = 1`; an "infinite range" port forces
    /// `steps := MAXIMUM_STEPS`.
    pub fn set_toggled(&mut self) {
        self.port_value_type = PortValueType::Toggled;
        self.steps = 1;
    }

    pub fn set_infinite_range(&mut self) {
        self.steps = MAXIMUM_STEPS;
    }

    pub fn points(&self) -> &[Acceleration] {
        &self.points
    }

    fn match_tolerance(&self) -> f64 {
        (self.upper - self.lower).abs() / MAXIMUM_STEPS as f64
    }

    fn insertion_index(&self, point: &Acceleration) -> std::result::Result<usize, usize> {
        self.points.binary_search_by(|p| acceleration_sort_func(p, point))
    }

    /// Inserts `point`, preserving sort order. If a point with the same
    /// `x` already exists in the target set (selected points if
    /// `use_selection`, else the whole list), its `(x, y)` is overwritten
    /// in place instead of inserting a duplicate.
    pub fn add_point(&mut self, point: Acceleration, use_selection: bool) {
        let existing = self
            .points
            .iter_mut()
            .find(|p| p.x == point.x && (!use_selection || p.selected));

        if let Some(existing) = existing {
            existing.x = point.x;
            existing.y = point.y;
            return;
        }

        let mut point = point;
        point.selected = use_selection;

        match self.insertion_index(&point) {
            Ok(idx) | Err(idx) => self.points.insert(idx, point),
        }
    }

    /// `use_selection = true` clears the selection flag instead of
    /// deleting the point outright; `false` removes it from the list.
    pub fn remove_point(&mut self, x: u32, y: f64, use_selection: bool) {
        if use_selection {
            if let Some(p) = self.points.iter_mut().find(|p| p.x == x && p.selected) {
                p.selected = false;
            }
        } else if let Some(idx) = self.points.iter().position(|p| p.x == x && p.y == y) {
            self.points.remove(idx);
        }
    }

    /// Removes the unique point whose `x` equals `x` and whose `y` lies
    /// within `±(upper-lower)/MAXIMUM_STEPS` of `y`.
    pub fn remove_point_at_position(&mut self, x: u32, y: f64) -> bool {
        let tolerance = self.match_tolerance();
        if let Some(idx) = self
            .points
            .iter()
            .position(|p| p.x == x && (p.y - y).abs() <= tolerance)
        {
            self.points.remove(idx);
            true
        } else {
            false
        }
    }

    /// Returns the first point with the given `x` (`y` is not used for
    /// equality here, without matching `y` to a single value.
    pub fn find_point(&self, x: u32, use_selection: bool) -> Option<Acceleration> {
        self.points.iter().find(|p| p.x == x && (!use_selection || p.selected)).copied()
    }

    /// Points with `x` in `[x0, x1]` and `y` in `[y0, y1)`. Bounds are
    /// normalized so `x0 <= x1` and `y0 <= y1`.
    pub fn find_region(&self, x0: u32, y0: f64, x1: u32, y1: f64, use_selection: bool) -> Vec<Acceleration> {
        let (x0, x1) = if x0 > x1 { (x1, x0) } else { (x0, x1) };
        let (y0, y1) = if y0 > y1 { (y1, y0) } else { (y0, y1) };

        self.points
            .iter()
            .filter(|p| (!use_selection || p.selected) && p.x >= x0 && p.x <= x1 && p.y >= y0 && p.y < y1)
            .copied()
            .collect()
    }

    pub fn selection(&self) -> Vec<Acceleration> {
        self.points.iter().filter(|p| p.selected).copied().collect()
    }

    pub fn is_selected(&self, x: u32, y: f64) -> bool {
        self.points.iter().any(|p| p.x == x && p.y == y && p.selected)
    }

    pub fn add_point_to_selection(&mut self, x: u32, y: f64) {
        if let Some(p) = self.points.iter_mut().find(|p| p.x == x && p.y == y) {
            p.selected = true;
        }
    }

    pub fn remove_point_from_selection(&mut self, x: u32, y: f64) {
        if let Some(p) = self.points.iter_mut().find(|p| p.x == x && p.y == y) {
            p.selected = false;
        }
    }

    pub fn add_region_to_selection(&mut self, x0: u32, y0: f64, x1: u32, y1: f64) {
        let (x0, x1) = if x0 > x1 { (x1, x0) } else { (x0, x1) };
        let (y0, y1) = if y0 > y1 { (y1, y0) } else { (y0, y1) };
        for p in self.points.iter_mut() {
            if p.x >= x0 && p.x <= x1 && p.y >= y0 && p.y < y1 {
                p.selected = true;
            }
        }
    }

    pub fn remove_region_from_selection(&mut self, x0: u32, y0: f64, x1: u32, y1: f64) {
        let (x0, x1) = if x0 > x1 { (x1, x0) } else { (x0, x1) };
        let (y0, y1) = if y0 > y1 { (y1, y0) } else { (y0, y1) };
        for p in self.points.iter_mut() {
            if p.x >= x0 && p.x <= x1 && p.y >= y0 && p.y < y1 {
                p.selected = false;
            }
        }
    }

    pub fn add_all_to_selection(&mut self) {
        for p in self.points.iter_mut() {
            p.selected = true;
        }
    }

    pub fn free_selection(&mut self) {
        for p in self.points.iter_mut() {
            p.selected = false;
        }
    }

    /// Serializes the current selection as clipboard XML. `x-boundary` is
    /// the smallest selected `x`; `y-boundary` is the smallest selected
    /// `y`. An empty selection yields boundaries `(0, 0.0)`.
    pub fn copy_selection(&self) -> String {
        let selection = self.selection();

        let x_boundary = selection.first().map(|p| p.x).unwrap_or(0);
        let y_boundary = selection.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let y_boundary = if selection.is_empty() { 0.0 } else { y_boundary };

        let mut writer = Writer::new(Vec::new());

        let mut root = BytesStart::new("automation");
        root.push_attribute(("program", "ags"));
        root.push_attribute(("type", CLIPBOARD_TYPE));
        root.push_attribute(("version", CLIPBOARD_VERSION));
        root.push_attribute(("format", CLIPBOARD_FORMAT));
        root.push_attribute(("control-name", self.control_name.as_str()));
        root.push_attribute(("line", self.line.to_string().as_str()));
        root.push_attribute(("x-boundary", x_boundary.to_string().as_str()));
        root.push_attribute(("y-boundary", format!("{y_boundary:.6}").as_str()));
        writer.write_event(Event::Start(root)).unwrap();

        let mut timestamp_el = BytesStart::new("timestamp");
        timestamp_el.push_attribute(("offset", self.timestamp.value().to_string().as_str()));
        writer.write_event(Event::Empty(timestamp_el)).unwrap();

        for point in &selection {
            let mut acc = BytesStart::new("acceleration");
            acc.push_attribute(("x", point.x.to_string().as_str()));
            acc.push_attribute(("y", format!("{:.6}", point.y).as_str()));
            writer.write_event(Event::Empty(acc)).unwrap();
        }

        writer.write_event(Event::End(BytesEnd::new("automation"))).unwrap();

        String::from_utf8(writer.into_inner()).expect("xml writer only emits utf8")
    }

    /// `copy_selection`, then removes selected points and clears the
    /// selection flags.
    pub fn cut_selection(&mut self) -> String {
        let xml = self.copy_selection();
        self.points.retain(|p| !p.selected);
        xml
    }

    /// Parses clipboard XML and inserts points into this automation,
    /// skipping nodes that are not `<automation>`.
    pub fn insert_from_clipboard(&mut self, xml: &str, reset_x: bool, x_offset: u32) {
        self.insert_from_clipboard_extended(xml, reset_x, x_offset, false, 0.0, false, false);
    }

    /// Full clipboard insert with line matching, duplicate suppression,
    /// and y-offset resetting.
    pub fn insert_from_clipboard_extended(
        &mut self,
        xml: &str,
        reset_x: bool,
        x_offset: u32,
        reset_y: bool,
        y_offset: f64,
        match_line: bool,
        no_duplicates: bool,
    ) {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut in_automation = false;
        let mut version = String::new();
        let mut x_boundary: Option<u32> = None;
        let mut y_boundary: Option<f64> = None;
        let mut line_ok = true;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(tag)) | Ok(Event::Empty(tag)) => {
                    let name = tag.name();
                    let local = String::from_utf8_lossy(name.as_ref()).to_string();

                    if local == "automation" {
                        in_automation = true;

                        let mut program_ok = false;
                        let mut format_ok = false;

                        for attr in tag.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                            let value = attr.unescape_value().unwrap_or_default().to_string();
                            match key.as_str() {
                                "program" => program_ok = value == "ags",
                                "version" => version = value,
                                "format" => format_ok = value == CLIPBOARD_FORMAT,
                                "line" => {
                                    if match_line && version != CLIPBOARD_LEGACY_VERSION {
                                        line_ok = value.parse::<u32>().ok() == Some(self.line);
                                    }
                                }
                                "x-boundary" => x_boundary = value.parse().ok(),
                                "y-boundary" => y_boundary = value.parse().ok(),
                                _ => {}
                            }
                        }

                        if !program_ok || !format_ok || !line_ok {
                            return;
                        }
                    } else if local == "acceleration" && in_automation {
                        let mut x_val: Option<u32> = None;
                        let mut y_val: Option<f64> = None;

                        for attr in tag.attributes().flatten() {
                            let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                            let value = attr.unescape_value().unwrap_or_default().to_string();
                            match key.as_str() {
                                "x" => x_val = value.parse().ok(),
                                "y" => y_val = value.parse().ok(),
                                _ => {}
                            }
                        }

                        let (Some(mut x_val), Some(mut y_val)) = (x_val, y_val) else {
                            continue;
                        };

                        if reset_x {
                            if let Some(boundary) = x_boundary {
                                x_val = reset_offset_u32(x_val, boundary, x_offset);
                            }
                        }

                        if reset_y {
                            if let Some(boundary) = y_boundary {
                                y_val = reset_offset_f64(y_val, boundary, y_offset);
                            }
                        }

                        if no_duplicates && self.find_point(x_val, false).map(|p| p.y == y_val).unwrap_or(false) {
                            continue;
                        }

                        let match_timestamp = true;
                        if match_timestamp && self.timestamp.is_offset_mode() {
                            let ts = self.timestamp.value();
                            if (x_val as u64) < ts || (x_val as u64) >= ts + self.timestamp.bucket_width() {
                                continue;
                            }
                        }

                        self.add_point(Acceleration::new(x_val, y_val), false);
                    }
                }
                Ok(Event::Eof) => break,
                Err(err) => {
                    tracing::warn!(%err, "clipboard xml parse error");
                    break;
                }
                _ => {}
            }
            buf.clear();
        }
    }

    /// Central value lookup: finds the automation point covering `[x,
    /// x_end)`, translating its `y` into the port's native type.
    /// Returns `(matched_x, value)`, or `None` when nothing matches.
    pub fn get_value(&self, x: u32, x_end: u32, use_prev_on_failure: bool) -> Option<(u32, PortValue)> {
        if self.points.is_empty() {
            return None;
        }

        let mut matching = bisect_in_range(&self.points, x, x_end);

        if matching.is_none() && use_prev_on_failure {
            matching = self
                .points
                .iter()
                .rev()
                .find(|p| p.x < x)
                .map(|p| (p.x, *p));
        }

        let (_, point) = matching?;

        // Walk forward keeping the last point still within [x, x_end).
        let mut result = point;
        if let Some(start_idx) = self.points.iter().position(|p| p.x == point.x && p.y == point.y) {
            for candidate in &self.points[start_idx + 1..] {
                if candidate.x > x_end {
                    break;
                }
                result = *candidate;
            }
        }

        let value = PortValue::from_y(self.port_value_type, result.y, false, self.default_value);
        Some((result.x, value))
    }
}

/// Bisects `points` (sorted by x) for the first point with `x` in `[lo,
/// hi)`, using a three-pointer narrowing scan (not a
/// plain binary search, to keep the documented `length <= 3` early exit).
fn bisect_in_range(points: &[Acceleration], lo: u32, hi: u32) -> Option<(u32, Acceleration)> {
    if points.is_empty() {
        return None;
    }

    let mut start = 0usize;
    let mut end = points.len() - 1;

    loop {
        let length = end - start + 1;
        let position = start + (length - 1) / 2;

        let start_point = points[start];
        if start_point.x > hi {
            return None;
        }
        if start_point.x >= lo && start_point.x < hi {
            return Some((start_point.x, start_point));
        }

        let end_point = points[end];
        if end_point.x < lo {
            return None;
        }
        if end_point.x >= lo && end_point.x < hi {
            return Some((end_point.x, end_point));
        }

        let mid_point = points[position];
        if mid_point.x >= lo && mid_point.x < hi {
            return Some((mid_point.x, mid_point));
        }

        if length <= 3 {
            return None;
        }

        if mid_point.x < lo {
            start = position + 1;
            if end > 0 {
                end -= 1;
            }
        } else if mid_point.x > hi {
            start += 1;
            end = position.saturating_sub(1).max(start);
        } else {
            start += 1;
        }

        if start > end {
            return None;
        }
    }
}

fn reset_offset_u32(value: u32, boundary: u32, offset: u32) -> u32 {
    if boundary < offset {
        value.saturating_add(offset - boundary)
    } else {
        value.saturating_sub(boundary - offset)
    }
}

fn reset_offset_f64(value: f64, boundary: f64, offset: f64) -> f64 {
    if boundary < offset {
        value + (offset - boundary)
    } else {
        value - (boundary - offset)
    }
}

/// Bisection used by `find_near_timestamp`: narrows `[start, end]` over a
/// slice of automations for the one whose timestamp bucket contains
/// `target`. Terminates when the slice is short or a bucket matches,
/// matching in three spots per round and giving up once the remaining
/// span is short, an intentionally imprecise short-circuit kept for
/// the regression tests below.
pub fn find_near_timestamp<'a>(
    automations: &'a [&'a Automation],
    line: u32,
    target: &Timestamp,
) -> Option<&'a Automation> {
    find_near_timestamp_extended(automations, line, None, None, target)
}

pub fn find_near_timestamp_extended<'a>(
    automations: &'a [&'a Automation],
    line: u32,
    channel_type: Option<&str>,
    control_name: Option<&str>,
    target: &Timestamp,
) -> Option<&'a Automation> {
    if automations.is_empty() {
        return None;
    }

    let matches = |a: &&Automation| {
        a.line == line
            && channel_type.map(|ct| a.channel_type == ct).unwrap_or(true)
            && control_name.map(|cn| a.control_name == cn).unwrap_or(true)
    };

    let bucket_contains = |a: &Automation| {
        let current = a.timestamp.value();
        let x = target.value();
        current >= x && current < x + target.bucket_width()
    };

    let mut start = 0usize;
    let mut end = automations.len() - 1;

    loop {
        let length = end - start + 1;
        let position = start + (length - 1) / 2;

        if matches(&automations[start]) && bucket_contains(automations[start]) {
            return Some(automations[start]);
        }
        if matches(&automations[end]) && bucket_contains(automations[end]) {
            return Some(automations[end]);
        }
        if matches(&automations[position]) && bucket_contains(automations[position]) {
            return Some(automations[position]);
        }

        if length <= 3 {
            return None;
        }

        let mid_x = automations[position].timestamp.value();
        let x = target.value();

        if mid_x < x {
            start += 1;
            end = end.saturating_sub(1).max(start);
        } else if mid_x > x {
            start += 1;
            end = position.saturating_sub(1).max(start);
        } else {
            start += 1;
        }

        if start > end {
            return None;
        }
    }
}

pub fn parse_point(x_str: &str, y_str: &str) -> Result<(u32, f64)> {
    let x = x_str
        .parse::<u32>()
        .map_err(|_| SoundcardError::ParseError(format!("bad x `{x_str}`")))?;
    let y = y_str
        .parse::<f64>()
        .map_err(|_| SoundcardError::ParseError(format!("bad y `{y_str}`")))?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn automation() -> Automation {
        let mut a = Automation::new(0, "AgsInput", "volume");
        a.lower = 0.0;
        a.upper = 1.0;
        a
    }

    #[test]
    fn add_then_find_then_remove_at_position() {
        let mut a = automation();
        a.add_point(Acceleration::new(100, 0.5), false);
        assert_eq!(a.find_point(100, false), Some(Acceleration { x: 100, y: 0.5, selected: false }));
        assert!(a.remove_point_at_position(100, 0.5));
        assert_eq!(a.find_point(100, false), None);
    }

    #[test]
    fn add_point_overwrites_same_x() {
        let mut a = automation();
        a.add_point(Acceleration::new(50, 0.1), false);
        a.add_point(Acceleration::new(50, 0.9), false);
        assert_eq!(a.points().len(), 1);
        assert_eq!(a.find_point(50, false).unwrap().y, 0.9);
    }

    #[test]
    fn copy_cut_free_insert_round_trip() {
        let mut a = automation();
        a.add_point(Acceleration::new(0, 0.0), false);
        a.add_point(Acceleration::new(10, 0.25), false);
        a.add_point(Acceleration::new(20, 0.75), false);
        a.add_all_to_selection();

        let xml = a.copy_selection();
        a.free_selection();

        let mut fresh = automation();
        fresh.insert_from_clipboard(&xml, false, 0);

        let mut expected: Vec<_> = a.points().to_vec();
        expected.iter_mut().for_each(|p| p.selected = false);
        let mut actual: Vec<_> = fresh.points().to_vec();
        actual.sort_by(acceleration_sort_func);
        expected.sort_by(acceleration_sort_func);
        assert_eq!(expected, actual);
    }

    #[test]
    fn cut_selection_removes_points_and_clears_selection() {
        let mut a = automation();
        a.add_point(Acceleration::new(5, 0.2), false);
        a.add_point(Acceleration::new(15, 0.8), false);
        a.add_point_to_selection(5, 0.2);

        let xml = a.cut_selection();
        assert!(xml.contains("x=\"5\""));
        assert_eq!(a.points().len(), 1);
        assert_eq!(a.selection().len(), 0);
    }

    #[test]
    fn clipboard_shift_scenario() {
        let mut source = automation();
        source.add_point(Acceleration::new(100, 0.2), false);
        source.add_point_to_selection(100, 0.2);

        let xml = source.copy_selection();
        assert!(xml.contains("x-boundary=\"100\""));

        let mut dest = automation();
        dest.timestamp = Timestamp::offset(0);
        dest.insert_from_clipboard(&xml, true, 200);

        assert_eq!(dest.find_point(200, false).unwrap().y, 0.2);
    }

    #[test]
    fn automation_lookup_scenario_returns_nearest_point() {
        let mut a = automation();
        a.port_value_type = PortValueType::Float;
        a.add_point(Acceleration::new(0, 0.0), false);
        a.add_point(Acceleration::new(1000, 0.5), false);
        a.add_point(Acceleration::new(2000, 1.0), false);

        let (x, value) = a.get_value(500, 1500, false).unwrap();
        assert_eq!(x, 1000);
        assert_eq!(value, PortValue::Float(0.5));
    }

    #[test]
    fn empty_automation_get_value_returns_none() {
        let a = automation();
        assert_eq!(a.get_value(10, 20, true), None);
    }

    #[test]
    fn point_at_zero_is_included_in_selection_with_zero_boundary() {
        let mut a = automation();
        a.add_point(Acceleration::new(0, 0.3), false);
        a.add_all_to_selection();
        let xml = a.copy_selection();
        assert!(xml.contains("x-boundary=\"0\""));
    }

    #[test]
    fn legacy_clipboard_ignores_line_even_when_match_line_requested() {
        let mut source = Automation::new(7, "AgsInput", "volume");
        source.add_point(Acceleration::new(3, 0.4), false);
        source.add_all_to_selection();
        let mut xml = source.copy_selection();
        xml = xml.replace(CLIPBOARD_VERSION, CLIPBOARD_LEGACY_VERSION);

        let mut dest = Automation::new(9, "AgsInput", "volume");
        dest.insert_from_clipboard_extended(&xml, false, 0, false, 0.0, true, false);
        assert_eq!(dest.points().len(), 1);
    }

    #[test]
    fn find_near_timestamp_three_point_boundary_case() {
        let a0 = {
            let mut a = Automation::new(1, "AgsInput", "volume");
            a.timestamp = Timestamp::offset(0);
            a
        };
        let a1 = {
            let mut a = Automation::new(1, "AgsInput", "volume");
            a.timestamp = Timestamp::offset(crate::timestamp::DEFAULT_OFFSET);
            a
        };
        let a2 = {
            let mut a = Automation::new(1, "AgsInput", "volume");
            a.timestamp = Timestamp::offset(2 * crate::timestamp::DEFAULT_OFFSET);
            a
        };

        let list = [&a0, &a1, &a2];
        let target = Timestamp::offset(crate::timestamp::DEFAULT_OFFSET);
        let found = find_near_timestamp(&list, 1, &target);
        assert!(found.is_some());
    }

    #[test]
    fn get_value_bisects_correctly_past_three_points() {
        let mut a = automation();
        a.port_value_type = PortValueType::Float;
        for i in 0..12u32 {
            a.add_point(Acceleration::new(i * 100, i as f64 / 10.0), false);
        }

        for i in 0..12u32 {
            let x = i * 100;
            let (found_x, value) = a.get_value(x, x + 1, false).unwrap();
            assert_eq!(found_x, x);
            assert_eq!(value, PortValue::Float(i as f64 / 10.0));
        }
    }

    #[test]
    fn find_near_timestamp_bisects_correctly_past_three_points() {
        let offset = crate::timestamp::DEFAULT_OFFSET;
        let automations: Vec<Automation> = (0..8u64)
            .map(|i| {
                let mut a = Automation::new(1, "AgsInput", "volume");
                a.timestamp = Timestamp::offset(i * offset);
                a
            })
            .collect();
        let refs: Vec<&Automation> = automations.iter().collect();

        for i in 0..8u64 {
            let target = Timestamp::offset(i * offset);
            let found = find_near_timestamp(&refs, 1, &target).expect("bucket should be found");
            assert_eq!(found.timestamp.value(), i * offset);
        }
    }
}
