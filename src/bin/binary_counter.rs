//! Four LED binary counter
//!
//! Hold the button to count up (LEDs blank while counting), release it to
//! see the value in binary.

#![no_std]
#![no_main]

use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::timer::timg::TimerGroup;
use esp_hal_embassy::Executor;
use esp_println::println;
use static_cell::StaticCell;

use iot_lab::config;
use iot_lab::counter::BinaryCounter;
use iot_lab::lights::LedBar;

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("[PANIC] {}", info);
    loop {}
}

#[embassy_executor::task]
async fn counter_task(mut leds: LedBar<Output<'static>, 4>, button: Input<'static>) -> ! {
    let mut counter = BinaryCounter::new();

    loop {
        let display = counter.update(button.is_low());
        if let Err(e) = leds.show_bits(display.bits()) {
            println!("[LED] Failed to update LEDs: {:?}", e);
        }

        Timer::after(Duration::from_millis(config::COUNTER_PERIOD_MS)).await;
        println!("[COUNTER] LED value (decimal): {}", counter.value());
    }
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    println!(
        "[LED] Counter LEDs on GPIO {:?}, button on GPIO{}",
        config::COUNTER_LED_PINS,
        config::COUNTER_BUTTON_PIN
    );
    // Keep in sync with config::COUNTER_LED_PINS and COUNTER_BUTTON_PIN
    let leds = LedBar::new([
        Output::new(peripherals.GPIO0, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO1, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO3, Level::Low, OutputConfig::default()),
    ]);
    let button = Input::new(
        peripherals.GPIO9,
        InputConfig::default().with_pull(Pull::Up),
    );

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        println!("[MAIN] Spawning counter task...");
        spawner.spawn(counter_task(leds, button)).ok();
    });
}
