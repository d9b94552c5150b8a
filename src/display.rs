extern crate image;
extern crate imageproc;
extern crate rppal;
extern crate std;

use imageproc::rect::Rect;
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::Spi;

use crate::result;

// 1.9" ST7789 glass, used in landscape.
pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 170;

const RST_PIN : u8 = 27;
const DC_PIN : u8 = 25;
const BACKLIGHT_PIN : u8 = 24;

const SPI_CLOCK_HZ : u32 = 40_000_000;
// spidev's default bufsiz.
const SPI_CHUNK : usize = 4096;

// The 170 visible lines sit 35 lines into the controller's 240-line RAM.
const X_OFFSET : u16 = 0;
const Y_OFFSET : u16 = 35;

const SWRESET : u8 = 0x01;
const SLPOUT : u8 = 0x11;
const NORON : u8 = 0x13;
const INVON : u8 = 0x21;
const DISPON : u8 = 0x29;
const CASET : u8 = 0x2A;
const RASET : u8 = 0x2B;
const RAMWR : u8 = 0x2C;
const MADCTL : u8 = 0x36;
const COLMOD : u8 = 0x3A;

const MADCTL_LANDSCAPE : u8 = 0x60; // MX | MV
const COLMOD_RGB565 : u8 = 0x55;

/// What changed on the canvas since the last flush.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Dirty {
    Full,
    Region(Rect),
    Clean,
}

pub trait Panel {
    fn name(&self) -> &str;
    fn show(&mut self, image: &image::RgbImage, dirty: Dirty) -> result::DashResult<()>;
}

pub struct St7789Panel {
    spi: Spi,
    dc_pin: OutputPin,
    _rst_pin: OutputPin,
    _backlight_pin: OutputPin,
}

impl St7789Panel {
    pub fn new() -> result::DashResult<St7789Panel> {
        let gpio = Gpio::new()?;
        let dc_pin = gpio.get(DC_PIN)?.into_output();
        let mut rst_pin = gpio.get(RST_PIN)?.into_output();
        let mut backlight_pin = gpio.get(BACKLIGHT_PIN)?.into_output();

        // Don't forget to enable SPI with sudo raspi-config
        let spi = Spi::new(
            rppal::spi::Bus::Spi0,
            rppal::spi::SlaveSelect::Ss0,
            SPI_CLOCK_HZ,
            rppal::spi::Mode::Mode0)?;

        rst_pin.set_low();
        std::thread::sleep(std::time::Duration::from_millis(20));
        rst_pin.set_high();
        std::thread::sleep(std::time::Duration::from_millis(120));

        backlight_pin.set_high();

        let mut panel = St7789Panel {
            spi: spi,
            dc_pin: dc_pin,
            _rst_pin: rst_pin,
            _backlight_pin: backlight_pin,
        };
        panel.init()?;
        return Ok(panel);
    }

    fn init(&mut self) -> result::DashResult<()> {
        self.send_command(SWRESET)?;
        std::thread::sleep(std::time::Duration::from_millis(150));

        self.send_command(SLPOUT)?;
        std::thread::sleep(std::time::Duration::from_millis(120));

        self.send_command(COLMOD)?;
        self.send_data(&[COLMOD_RGB565])?;

        self.send_command(MADCTL)?;
        self.send_data(&[MADCTL_LANDSCAPE])?;

        // IPS glass wants inverted colors.
        self.send_command(INVON)?;
        self.send_command(NORON)?;
        std::thread::sleep(std::time::Duration::from_millis(10));

        self.send_command(DISPON)?;
        std::thread::sleep(std::time::Duration::from_millis(20));

        return Ok(());
    }

    fn send_command(&mut self, command: u8) -> result::DashResult<()> {
        self.dc_pin.set_low();
        self.spi.write(&[command])?;
        return Ok(());
    }

    fn send_data(&mut self, data: &[u8]) -> result::DashResult<()> {
        self.dc_pin.set_high();
        for chunk in data.chunks(SPI_CHUNK) {
            self.spi.write(chunk)?;
        }
        return Ok(());
    }

    fn set_window(&mut self, rect: &Rect) -> result::DashResult<()> {
        let x0 = rect.left() as u16 + X_OFFSET;
        let x1 = rect.right() as u16 + X_OFFSET;
        let y0 = rect.top() as u16 + Y_OFFSET;
        let y1 = rect.bottom() as u16 + Y_OFFSET;

        self.send_command(CASET)?;
        self.send_data(&[(x0 >> 8) as u8, x0 as u8, (x1 >> 8) as u8, x1 as u8])?;
        self.send_command(RASET)?;
        self.send_data(&[(y0 >> 8) as u8, y0 as u8, (y1 >> 8) as u8, y1 as u8])?;
        self.send_command(RAMWR)?;
        return Ok(());
    }
}

impl Panel for St7789Panel {
    fn name(&self) -> &str {
        return "st7789";
    }

    fn show(&mut self, image: &image::RgbImage, dirty: Dirty) -> result::DashResult<()> {
        let rect = match flush_area(image, dirty) {
            Some(rect) => rect,
            None => return Ok(()),
        };

        let pixels = rgb565_bytes(image, &rect);
        self.set_window(&rect)?;
        self.send_data(&pixels)?;
        return Ok(());
    }
}

/// Writes the whole canvas to a PNG on every full redraw.
pub struct PngPanel {
    path: String,
}

impl PngPanel {
    pub fn new(path: &str) -> PngPanel {
        return PngPanel {
            path: path.to_string(),
        };
    }
}

impl Panel for PngPanel {
    fn name(&self) -> &str {
        return &self.path;
    }

    fn show(&mut self, image: &image::RgbImage, dirty: Dirty) -> result::DashResult<()> {
        if dirty == Dirty::Full {
            image.save(&self.path)?;
        }
        return Ok(());
    }
}

pub fn canvas_rect(image: &image::RgbImage) -> Rect {
    return Rect::at(0, 0).of_size(image.width(), image.height());
}

fn flush_area(image: &image::RgbImage, dirty: Dirty) -> Option<Rect> {
    match dirty {
        Dirty::Full => Some(canvas_rect(image)),
        Dirty::Region(rect) => canvas_rect(image).intersect(rect),
        Dirty::Clean => None,
    }
}

pub fn rgb565(pixel: &image::Rgb<u8>) -> u16 {
    let [r, g, b] = pixel.0;
    return ((r as u16 & 0xF8) << 8) | ((g as u16 & 0xFC) << 3) | (b as u16 >> 3);
}

// Big-endian, row by row, the order RAMWR expects.
fn rgb565_bytes(image: &image::RgbImage, rect: &Rect) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 * rect.width() as usize * rect.height() as usize);
    for y in rect.top()..=rect.bottom() {
        for x in rect.left()..=rect.right() {
            let value = rgb565(image.get_pixel(x as u32, y as u32));
            bytes.push((value >> 8) as u8);
            bytes.push(value as u8);
        }
    }
    return bytes;
}

#[cfg(test)]
mod tests {
    use imageproc::rect::Rect;

    use super::{Dirty, Panel};

    #[test]
    fn rgb565_palette() {
        assert_eq!(0xFFFF, super::rgb565(&image::Rgb([255, 255, 255])));
        assert_eq!(0xF800, super::rgb565(&image::Rgb([255, 0, 0])));
        assert_eq!(0x001F, super::rgb565(&image::Rgb([0, 0, 255])));
        assert_eq!(0xFFE0, super::rgb565(&image::Rgb([255, 255, 0])));
        assert_eq!(0x0000, super::rgb565(&image::Rgb([7, 3, 7])));
    }

    #[test]
    fn region_bytes_are_row_major() {
        let mut image = image::RgbImage::new(4, 3);
        image.put_pixel(1, 1, image::Rgb([255, 0, 0]));
        image.put_pixel(2, 1, image::Rgb([0, 0, 255]));
        image.put_pixel(1, 2, image::Rgb([255, 255, 255]));

        let bytes = super::rgb565_bytes(&image, &Rect::at(1, 1).of_size(2, 2));
        assert_eq!(vec![0xF8, 0x00, 0x00, 0x1F, 0xFF, 0xFF, 0x00, 0x00], bytes);
    }

    #[test]
    fn flush_area_is_clipped() {
        let image = image::RgbImage::new(super::WIDTH, super::HEIGHT);

        assert_eq!(Some(Rect::at(0, 0).of_size(320, 170)),
                   super::flush_area(&image, Dirty::Full));
        assert_eq!(Some(Rect::at(0, 112).of_size(320, 30)),
                   super::flush_area(&image, Dirty::Region(Rect::at(0, 112).of_size(320, 30))));
        assert_eq!(Some(Rect::at(0, 160).of_size(320, 10)),
                   super::flush_area(&image, Dirty::Region(Rect::at(0, 160).of_size(320, 30))));
        assert_eq!(None, super::flush_area(&image, Dirty::Region(Rect::at(0, 218).of_size(320, 30))));
        assert_eq!(None, super::flush_area(&image, Dirty::Clean));
    }

    #[test]
    fn png_panel_only_writes_full_frames() {
        let path = std::env::temp_dir().join(format!("oebbdash-panel-{}.png", std::process::id()));
        let path_str = path.to_str().expect("temp path").to_string();
        let _ = std::fs::remove_file(&path);

        let image = image::RgbImage::new(8, 8);
        let mut panel = super::PngPanel::new(&path_str);

        panel.show(&image, Dirty::Region(Rect::at(0, 0).of_size(4, 4))).expect("show region");
        assert!(!path.exists());

        panel.show(&image, Dirty::Full).expect("show full");
        assert!(path.exists());
        let _ = std::fs::remove_file(&path);
    }
}
