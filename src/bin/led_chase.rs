//! Eight LED chase with two direction buttons
//!
//! The buttons are serviced on their falling edge (GPIO interrupt); the
//! chase task moves the lit LED once a second in the last chosen direction.

#![no_std]
#![no_main]

use embassy_time::{Duration, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::timer::timg::TimerGroup;
use esp_hal_embassy::Executor;
use esp_println::println;
use static_cell::StaticCell;

use iot_lab::chase::{Chase, ChaseControl, Direction};
use iot_lab::config;
use iot_lab::lights::LedBar;

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

static CHASE_CONTROL: ChaseControl = ChaseControl::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("[PANIC] {}", info);
    loop {}
}

#[embassy_executor::task(pool_size = 2)]
async fn button_task(
    mut button: Input<'static>,
    direction: Direction,
    control: &'static ChaseControl,
) -> ! {
    loop {
        button.wait_for_falling_edge().await;
        control.set_direction(direction);
        println!("[BUTTON] Direction: {:?}", direction);
    }
}

#[embassy_executor::task]
async fn chase_task(mut leds: LedBar<Output<'static>, 8>, control: &'static ChaseControl) -> ! {
    let mut chase = Chase::new();

    loop {
        if let Err(e) = leds.show_bits(chase.value()) {
            println!("[LED] Failed to update LEDs: {:?}", e);
        }
        println!("[CHASE] Current value: 0x{:02X}", chase.value());

        chase.advance(control.direction());
        Timer::after(Duration::from_millis(config::CHASE_PERIOD_MS)).await;
    }
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    println!("[LED] Chase LEDs on GPIO {:?}", config::CHASE_LED_PINS);
    // Keep in sync with config::CHASE_LED_PINS
    let leds = LedBar::new([
        Output::new(peripherals.GPIO0, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO1, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO2, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO3, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO5, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO6, Level::Low, OutputConfig::default()),
        Output::new(peripherals.GPIO7, Level::Low, OutputConfig::default()),
    ]);

    println!(
        "[BUTTON] Back on GPIO{}, go on GPIO{}",
        config::CHASE_BACK_BUTTON_PIN,
        config::CHASE_GO_BUTTON_PIN
    );
    // Keep in sync with config::CHASE_BACK_BUTTON_PIN and CHASE_GO_BUTTON_PIN
    let back = Input::new(
        peripherals.GPIO9,
        InputConfig::default().with_pull(Pull::Up),
    );
    let go = Input::new(
        peripherals.GPIO10,
        InputConfig::default().with_pull(Pull::Up),
    );

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        println!("[MAIN] Spawning button tasks...");
        spawner
            .spawn(button_task(go, Direction::Forward, &CHASE_CONTROL))
            .ok();
        spawner
            .spawn(button_task(back, Direction::Backward, &CHASE_CONTROL))
            .ok();

        println!("[MAIN] Spawning chase task...");
        spawner.spawn(chase_task(leds, &CHASE_CONTROL)).ok();
    });
}
