extern crate anyhow;
extern crate image;
extern crate imageproc;
extern crate rusttype;
extern crate std;

use anyhow::Context;
use imageproc::rect::Rect;

use crate::display;
use crate::marquee;
use crate::result;
use crate::structs;

// sudo apt-get install fonts-roboto
pub const DEFAULT_FONT: &str = "/usr/share/fonts/truetype/roboto/hinted/RobotoCondensed-Regular.ttf";
pub const DEFAULT_FONT_BOLD: &str = "/usr/share/fonts/truetype/roboto/hinted/RobotoCondensed-Bold.ttf";

pub const HEADER_HEIGHT: i32 = 30;
pub const DEPARTURE_HEIGHT: i32 = 106;
pub const INFO_HEIGHT: i32 = 24;
const INFO_TRAILER_HEIGHT: i32 = 6;
const MARGIN: i32 = 10;
const PILL_RADIUS: i32 = 6;
const PILL_PADDING: i32 = 7;

const SIZE_SMALL: f32 = 14.0;
const SIZE_MEDIUM: f32 = 19.0;
const SIZE_BIG: f32 = 32.0;
const SIZE_TITLE: f32 = 26.0;

const NO_DEPARTURES: &str = "Keine Abfahrten";
const ERROR_TITLE: &str = "FEHLER";
const BRAND: &str = "ÖBB";
const BOOT_TITLE: &str = "ÖBB Monitor";
const BOOT_MESSAGE: &str = "Initialisiere...";

pub struct Styles<'a> {
    pub font: rusttype::Font<'a>,
    pub font_bold: rusttype::Font<'a>,

    pub color_background: image::Rgb<u8>,
    pub color_header: image::Rgb<u8>,
    pub color_red: image::Rgb<u8>,
    pub color_pill: image::Rgb<u8>,
    pub color_white: image::Rgb<u8>,
    pub color_yellow: image::Rgb<u8>,
    pub color_grey: image::Rgb<u8>,
}

impl Styles<'static> {
    pub fn load(font_path: &str, font_bold_path: &str) -> result::DashResult<Styles<'static>> {
        return Ok(Styles {
            font: load_font(font_path)?,
            font_bold: load_font(font_bold_path)?,

            color_background: image::Rgb([0, 0, 255]),
            color_header: image::Rgb([0, 0, 123]),
            color_red: image::Rgb([255, 0, 0]),
            color_pill: image::Rgb([8, 0, 8]),
            color_white: image::Rgb([255, 255, 255]),
            color_yellow: image::Rgb([255, 255, 0]),
            color_grey: image::Rgb([132, 130, 132]),
        });
    }
}

fn load_font(path: &str) -> result::DashResult<rusttype::Font<'static>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Reading font '{}'", path))?;
    return rusttype::Font::try_from_vec(bytes)
        .ok_or_else(|| result::make_error(&format!("Not a usable font: '{}'", path)));
}

pub fn card_top(slot: usize) -> i32 {
    return HEADER_HEIGHT + slot as i32 * DEPARTURE_HEIGHT;
}

pub fn info_top(slot: usize) -> i32 {
    return card_top(slot) + DEPARTURE_HEIGHT - INFO_HEIGHT;
}

pub struct Renderer<'a> {
    canvas: image::RgbImage,
    styles: Styles<'a>,
}

impl<'a> Renderer<'a> {
    pub fn new(styles: Styles<'a>) -> Renderer<'a> {
        return Renderer {
            canvas: image::RgbImage::new(display::WIDTH, display::HEIGHT),
            styles: styles,
        };
    }

    pub fn canvas(&self) -> &image::RgbImage {
        return &self.canvas;
    }

    fn width(&self) -> i32 {
        return self.canvas.width() as i32;
    }

    fn height(&self) -> i32 {
        return self.canvas.height() as i32;
    }

    pub fn draw_full_screen(&mut self, slots: &mut structs::Slots, clock: &str) -> display::Dirty {
        let (width, height) = (self.width(), self.height());
        fill(&mut self.canvas, 0, 0, width, height, self.styles.color_background);

        self.draw_header(&slots[0], clock);

        let mut y = HEADER_HEIGHT;
        for (slot, record) in slots.iter_mut().enumerate() {
            if record.valid {
                self.draw_departure(slot, record);
                y = card_top(slot) + DEPARTURE_HEIGHT;
            }
        }

        if y < height {
            fill(&mut self.canvas, 0, y, width, height - y, self.styles.color_header);
        }

        if !slots[0].valid {
            let text_width = text_width(&self.styles.font, SIZE_MEDIUM, NO_DEPARTURES);
            let baseline = height / 2 + ascent(&self.styles.font, SIZE_MEDIUM) / 2;
            let color = self.styles.color_white;
            self.text_at_baseline(false, SIZE_MEDIUM, color, width / 2 - text_width / 2, baseline, NO_DEPARTURES);
        }

        return display::Dirty::Full;
    }

    /// Repaints one info bar and moves its marquee one step.
    pub fn draw_info_line(&mut self, slot: usize, record: &mut structs::DepartureRecord) -> display::Dirty {
        let (area, text_width) = self.paint_info_line(info_top(slot), record);
        marquee::tick(record, text_width);

        match display::canvas_rect(&self.canvas).intersect(area) {
            Some(area) => display::Dirty::Region(area),
            None => display::Dirty::Clean,
        }
    }

    pub fn draw_error_screen(&mut self, message: &str) -> display::Dirty {
        let (width, height) = (self.width(), self.height());
        fill(&mut self.canvas, 0, 0, width, height, self.styles.color_red);

        let color = self.styles.color_white;
        self.text_centered(true, SIZE_TITLE, color, height / 2 - 20, ERROR_TITLE);
        self.text_centered(false, SIZE_SMALL, color, height / 2 + 20, message);

        return display::Dirty::Full;
    }

    pub fn draw_boot_screen(&mut self) -> display::Dirty {
        let (width, height) = (self.width(), self.height());
        fill(&mut self.canvas, 0, 0, width, height, self.styles.color_background);

        let white = self.styles.color_white;
        self.text_centered(true, SIZE_TITLE, white, height / 2 - 20, BOOT_TITLE);
        self.text_centered(false, SIZE_SMALL, white, height / 2 + 20, BOOT_MESSAGE);

        return display::Dirty::Full;
    }

    fn draw_header(&mut self, first: &structs::DepartureRecord, clock: &str) {
        let width = self.width();
        fill(&mut self.canvas, 0, 0, width, HEADER_HEIGHT, self.styles.color_header);

        let baseline = 6 + ascent(&self.styles.font, SIZE_MEDIUM);

        let red = self.styles.color_red;
        self.text_at_baseline(false, SIZE_MEDIUM, red, MARGIN, baseline, BRAND);

        if first.valid {
            let white = self.styles.color_white;
            self.text_at_baseline(false, SIZE_MEDIUM, white, 60, baseline, &first.train_label());
        }

        let pill_width = text_width(&self.styles.font, SIZE_SMALL, clock) + 2 * PILL_PADDING;
        let pill_x = width - pill_width - MARGIN;
        fill_rounded(&mut self.canvas, pill_x, 4, pill_width, HEADER_HEIGHT - 8,
                     PILL_RADIUS, self.styles.color_pill);

        let white = self.styles.color_white;
        self.text_at_baseline(false, SIZE_SMALL, white, pill_x + PILL_PADDING, baseline, clock);
    }

    fn draw_departure(&mut self, slot: usize, record: &mut structs::DepartureRecord) {
        let top = card_top(slot);
        let width = self.width();
        fill(&mut self.canvas, 0, top, width, DEPARTURE_HEIGHT, self.styles.color_background);

        let white = self.styles.color_white;
        let time_width = text_width(&self.styles.font, SIZE_BIG, &record.scheduled_time);
        self.text(false, SIZE_BIG, white, MARGIN, top + 8, &record.scheduled_time);

        if record.is_delayed && record.estimated_time != record.scheduled_time {
            let yellow = self.styles.color_yellow;
            self.text(false, SIZE_MEDIUM, yellow, MARGIN + time_width + 8, top + 10, &record.estimated_time);
        }

        let font = &self.styles.font;
        let destination = fit_text(&record.destination, width - 2 * MARGIN,
                                   |t| text_width(font, SIZE_MEDIUM, t));
        self.text(false, SIZE_MEDIUM, white, MARGIN, top + 48, &destination);

        if !record.info_line.is_empty() {
            self.paint_info_line(info_top(slot), record);
        }
    }

    // Returns the touched area and the measured text width.
    fn paint_info_line(&mut self, top: i32, record: &mut structs::DepartureRecord) -> (Rect, i32) {
        let width = self.width();
        fill(&mut self.canvas, 0, top, width, INFO_HEIGHT, self.styles.color_grey);
        fill(&mut self.canvas, 0, top + INFO_HEIGHT, width, INFO_TRAILER_HEIGHT, self.styles.color_header);

        let color = self.styles.color_header;
        let text_width = text_width(&self.styles.font, SIZE_SMALL, &record.info_line);
        let (x, trailing) = marquee::lay_out(record, text_width, MARGIN, width);
        self.text(false, SIZE_SMALL, color, x, top + 4, &record.info_line);
        if let Some(x) = trailing {
            self.text(false, SIZE_SMALL, color, x, top + 4, &record.info_line);
        }

        let area = Rect::at(0, top).of_size(width as u32, (INFO_HEIGHT + INFO_TRAILER_HEIGHT) as u32);
        return (area, text_width);
    }

    // `y` is the top of the text box, like imageproc's draw_text_mut.
    fn text(&mut self, bold: bool, size: f32, color: image::Rgb<u8>, x: i32, y: i32, text: &str) {
        let font = if bold { &self.styles.font_bold } else { &self.styles.font };
        imageproc::drawing::draw_text_mut(&mut self.canvas, color, x, y, scale(size), font, text);
    }

    fn text_at_baseline(&mut self, bold: bool, size: f32, color: image::Rgb<u8>, x: i32, baseline: i32, text: &str) {
        let top = baseline - ascent(&self.styles.font, size);
        self.text(bold, size, color, x, top, text);
    }

    fn text_centered(&mut self, bold: bool, size: f32, color: image::Rgb<u8>, center_y: i32, text: &str) {
        let font = if bold { &self.styles.font_bold } else { &self.styles.font };
        let v_metrics = font.v_metrics(scale(size));
        let line_height = (v_metrics.ascent - v_metrics.descent).ceil() as i32;
        let x = (self.width() - text_width(font, size, text)) / 2;
        self.text(bold, size, color, x, center_y - line_height / 2, text);
    }
}

/// Chops characters off `text` until it fits, then marks it with an ellipsis.
pub fn fit_text<F: Fn(&str) -> i32>(text: &str, max_width: i32, measure: F) -> String {
    let mut fitted = text.to_string();
    while measure(&fitted) > max_width && fitted.chars().count() > 3 {
        fitted.pop();
    }
    if fitted != text {
        fitted.push('…');
    }
    return fitted;
}

fn scale(s: f32) -> rusttype::Scale {
    return rusttype::Scale { x: s, y: s };
}

fn ascent(font: &rusttype::Font, size: f32) -> i32 {
    return font.v_metrics(scale(size)).ascent.round() as i32;
}

fn text_width(font: &rusttype::Font, size: f32, text: &str) -> i32 {
    return font.layout(text, scale(size), rusttype::point(0.0, 0.0))
        .last()
        .map(|g| (g.position().x + g.unpositioned().h_metrics().advance_width).ceil() as i32)
        .unwrap_or(0);
}

fn fill(canvas: &mut image::RgbImage, x: i32, y: i32, w: i32, h: i32, color: image::Rgb<u8>) {
    if w <= 0 || h <= 0 {
        return;
    }
    imageproc::drawing::draw_filled_rect_mut(
        canvas, Rect::at(x, y).of_size(w as u32, h as u32), color);
}

fn fill_rounded(canvas: &mut image::RgbImage, x: i32, y: i32, w: i32, h: i32, r: i32, color: image::Rgb<u8>) {
    let r = std::cmp::min(r, std::cmp::min(w, h) / 2);
    fill(canvas, x + r, y, w - 2 * r, h, color);
    fill(canvas, x, y + r, w, h - 2 * r, color);
    for (cx, cy) in &[(x + r, y + r), (x + w - 1 - r, y + r),
                      (x + r, y + h - 1 - r), (x + w - 1 - r, y + h - 1 - r)] {
        imageproc::drawing::draw_filled_circle_mut(canvas, (*cx, *cy), r, color);
    }
}
