#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use core::cell::RefCell;

use critical_section::Mutex;
use embassy_executor::Spawner;
use embassy_time::{Delay, Duration, Instant, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard;
use esp_hal::analog::adc::{Adc, AdcConfig, Attenuation};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Event, Input, InputConfig, Io, Level, Output, OutputConfig, Pull};
use esp_hal::handler;
use esp_hal::i2c::master::{Config as I2cConfig, I2c};
use esp_hal::peripherals::Peripherals;
use esp_hal::spi::Mode as SpiMode;
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::uart::{Config as UartConfig, Uart};
use log::info;
use static_cell::StaticCell;
use thiserror_no_std::Error;

use meteo_core::app_state::{Fault, Station};
use meteo_core::buttons::{Button, ButtonSignals, detect_boot_mode};
use meteo_core::storage::sd_card::SdCardVolume;
use meteo_firmware::board::{Eeprom, FirmwareBoard, I2cBus, share_i2c};
use meteo_firmware::drivers::{
    AnalogLight, At24c32, Bme280Climate, Ds1307, FixedTime, P9813, UartConsole, UartGps,
};

const SERIAL_BAUD: u32 = 9600;
const LOOP_PERIOD: Duration = Duration::from_millis(10);

static SIGNALS: ButtonSignals = ButtonSignals::new();
static GREEN_BUTTON: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));
static RED_BUTTON: Mutex<RefCell<Option<Input<'static>>>> = Mutex::new(RefCell::new(None));
static I2C_BUS: StaticCell<RefCell<I2cBus>> = StaticCell::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
enum InitError {
    #[error("I2C configuration rejected")]
    I2c,
    #[error("SPI configuration rejected")]
    Spi,
    #[error("UART configuration rejected")]
    Uart,
    #[error("SD card chip select unavailable")]
    ChipSelect,
}

struct Hardware {
    board: FirmwareBoard,
    eeprom: Eeprom,
    green: Input<'static>,
    red: Input<'static>,
}

/// Bring up every peripheral.
///
/// Pin map:
/// - I2C0 (BME280, DS1307, AT24C32): SDA GPIO8, SCL GPIO9
/// - SPI2 (SD card): SCK GPIO12, MOSI GPIO11, MISO GPIO13, CS GPIO10
/// - UART0 (console): TX GPIO43, RX GPIO44
/// - UART1 (GPS): TX GPIO17, RX GPIO18
/// - P9813 LED: clock GPIO4, data GPIO5
/// - Buttons (active low): green GPIO6, red GPIO7
/// - Light sensor: GPIO1 on ADC1
fn bring_up(peripherals: Peripherals) -> Result<Hardware, InitError> {
    let i2c = I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(100)),
    )
    .map_err(|_| InitError::I2c)?
    .with_sda(peripherals.GPIO8)
    .with_scl(peripherals.GPIO9);
    let bus = I2C_BUS.init(RefCell::new(i2c));
    let (climate_i2c, clock_i2c, eeprom_i2c) = share_i2c(bus);

    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_khz(400))
            .with_mode(SpiMode::_0),
    )
    .map_err(|_| InitError::Spi)?
    .with_sck(peripherals.GPIO12)
    .with_mosi(peripherals.GPIO11)
    .with_miso(peripherals.GPIO13);
    let cs = Output::new(peripherals.GPIO10, Level::High, OutputConfig::default());
    let sd_spi = ExclusiveDevice::new(spi, cs, Delay).map_err(|_| InitError::ChipSelect)?;
    let volume = SdCardVolume::new(SdCard::new(sd_spi, Delay), FixedTime);

    let console = Uart::new(
        peripherals.UART0,
        UartConfig::default().with_baudrate(SERIAL_BAUD),
    )
    .map_err(|_| InitError::Uart)?
    .with_tx(peripherals.GPIO43)
    .with_rx(peripherals.GPIO44);
    let gps = Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(SERIAL_BAUD),
    )
    .map_err(|_| InitError::Uart)?
    .with_tx(peripherals.GPIO17)
    .with_rx(peripherals.GPIO18);

    let mut adc_config = AdcConfig::new();
    let light_pin = adc_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let adc = Adc::new(peripherals.ADC1, adc_config);

    let led = P9813::new(
        Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO5, Level::Low, OutputConfig::default()),
        Delay,
    );

    let button_config = InputConfig::default().with_pull(Pull::Up);
    let green = Input::new(peripherals.GPIO6, button_config);
    let red = Input::new(peripherals.GPIO7, button_config);

    let mut io = Io::new(peripherals.IO_MUX);
    io.set_interrupt_handler(on_button);

    Ok(Hardware {
        board: FirmwareBoard {
            climate: Bme280Climate::new(climate_i2c, Delay),
            light: AnalogLight::new(adc, light_pin),
            gps: UartGps::new(gps),
            clock: Ds1307::new(clock_i2c),
            volume,
            led,
            console: UartConsole::new(console),
        },
        eeprom: At24c32::new(eeprom_i2c, Delay),
        green,
        red,
    })
}

#[handler]
fn on_button() {
    let now = Instant::now();
    critical_section::with(|cs| {
        for (slot, button) in [(&GREEN_BUTTON, Button::Green), (&RED_BUTTON, Button::Red)] {
            if let Some(pin) = slot.borrow_ref_mut(cs).as_mut()
                && pin.is_interrupt_set()
            {
                SIGNALS.on_edge(button, pin.is_low(), now);
                pin.clear_interrupt();
            }
        }
    });
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(_spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!();

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let Hardware {
        board,
        eeprom,
        mut green,
        mut red,
    } = match bring_up(peripherals) {
        Ok(hardware) => hardware,
        Err(e) => panic!("Hardware bring-up failed: {}", e),
    };

    let boot_mode = detect_boot_mode(&mut red, Instant::now);
    info!("Boot mode: {}", boot_mode.label());

    let mut station = Station::new(board, eeprom, &SIGNALS);

    if let Err(fault) = station
        .board_mut()
        .climate
        .init()
        .map_err(Fault::from)
        .and_then(|()| station.start(boot_mode, Instant::now()))
        .and_then(|()| station.await_gps_link(Instant::now))
    {
        station.halt(fault, &mut Delay);
    }

    critical_section::with(|cs| {
        green.listen(Event::AnyEdge);
        red.listen(Event::AnyEdge);
        GREEN_BUTTON.borrow_ref_mut(cs).replace(green);
        RED_BUTTON.borrow_ref_mut(cs).replace(red);
    });

    info!("Station running in {} mode", station.mode().label());

    loop {
        if let Err(fault) = station.poll(Instant::now()) {
            station.halt(fault, &mut Delay);
        }
        Timer::after(LOOP_PERIOD).await;
    }
}
