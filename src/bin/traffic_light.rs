//! Traffic light gated by an ultrasonic proximity sensor
//!
//! Two tasks: the sequencer cycles the lamps, the monitor measures distance
//! every 200 ms and pauses the sequencer (red lamp forced) while something
//! is within one meter.

#![no_std]
#![no_main]

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Instant, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::timer::timg::TimerGroup;
use esp_hal_embassy::Executor;
use esp_println::println;
use static_cell::StaticCell;

use iot_lab::config;
use iot_lab::lights::TrafficLights;
use iot_lab::proximity::{MonitorEvent, ProximityMonitor};
use iot_lab::traffic::{Sequencer, SequencerTick, TrafficContext, next_hold_slice};
use iot_lab::ultrasonic::{SystemClock, Ultrasonic};

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

type Lights = TrafficLights<Output<'static>>;
type Sensor = Ultrasonic<Output<'static>, Input<'static>, Delay, SystemClock>;

static LIGHTS_CELL: StaticCell<Mutex<CriticalSectionRawMutex, Lights>> = StaticCell::new();
static TRAFFIC: TrafficContext = TrafficContext::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("[PANIC] {}", info);
    loop {}
}

#[embassy_executor::task]
async fn sequencer_task(
    lights: &'static Mutex<CriticalSectionRawMutex, Lights>,
    context: &'static TrafficContext,
) -> ! {
    let poll = Duration::from_millis(config::SEQUENCER_POLL_MS);
    let mut sequencer = Sequencer::new();

    println!("[TRAFFIC] Sequencer started");

    loop {
        // The enable check and the lamp write happen under the same lock
        let tick = {
            let mut lights = lights.lock().await;
            sequencer.tick(context, &mut *lights)
        };

        match tick {
            Ok(SequencerTick::Advanced { from, hold_secs }) => {
                println!(
                    "[TRAFFIC] {} on for {} s (next: {})",
                    from.name(),
                    hold_secs,
                    sequencer.get_current_state().name()
                );
                hold(context, Duration::from_secs(u64::from(hold_secs))).await;
            }
            Ok(SequencerTick::Paused) => Timer::after(poll).await,
            Err(e) => {
                println!("[TRAFFIC] Failed to drive lamps: {:?}", e);
                Timer::after(poll).await;
            }
        }
    }
}

/// Wait out a state's hold time, returning early once paused
async fn hold(context: &TrafficContext, duration: Duration) {
    let deadline_ms = (Instant::now() + duration).as_millis();

    while let Some(wait_ms) = next_hold_slice(
        Instant::now().as_millis(),
        deadline_ms,
        config::SEQUENCER_POLL_MS,
        context.is_enabled(),
    ) {
        Timer::after(Duration::from_millis(wait_ms)).await;
    }
}

#[embassy_executor::task]
async fn monitor_task(
    mut sensor: Sensor,
    lights: &'static Mutex<CriticalSectionRawMutex, Lights>,
    context: &'static TrafficContext,
) -> ! {
    let mut monitor = ProximityMonitor::new(config::PROXIMITY_THRESHOLD_M);

    println!(
        "[MONITOR] Monitor started, threshold {} m",
        monitor.threshold()
    );

    loop {
        let reading = sensor.measure(config::ULTRASONIC_MAX_DISTANCE_M);

        let event = {
            let mut lights = lights.lock().await;
            monitor.handle(reading, &mut *lights, context)
        };

        match event {
            Ok(MonitorEvent::Alerted { distance }) => {
                println!("[MONITOR] Distance: {:.4} m", distance);
                println!("[MONITOR] Object within range - red forced, sequencer paused");
            }
            Ok(MonitorEvent::Cleared { distance }) => {
                println!("[MONITOR] Distance: {:.4} m", distance);
                println!("[MONITOR] Path clear - sequencer resumed");
            }
            Ok(MonitorEvent::Unchanged { distance }) => {
                println!("[MONITOR] Distance: {:.4} m", distance);
            }
            Ok(MonitorEvent::SensorFault(err)) => {
                println!("[SENSOR] {}", err);
            }
            Err(e) => {
                println!("[MONITOR] Failed to force alert lamps: {:?}", e);
            }
        }

        Timer::after(Duration::from_millis(config::MONITOR_PERIOD_MS)).await;
    }
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Initialize embassy time system
    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    println!(
        "[LED] Traffic light on GPIO{} (red), GPIO{} (yellow), GPIO{} (green)",
        config::TRAFFIC_RED_PIN,
        config::TRAFFIC_YELLOW_PIN,
        config::TRAFFIC_GREEN_PIN
    );
    // Keep in sync with config::TRAFFIC_*_PIN
    let red = Output::new(peripherals.GPIO3, Level::Low, OutputConfig::default());
    let yellow = Output::new(peripherals.GPIO4, Level::Low, OutputConfig::default());
    let green = Output::new(peripherals.GPIO5, Level::Low, OutputConfig::default());
    let lights = LIGHTS_CELL.init(Mutex::new(TrafficLights::new(red, yellow, green)));

    println!(
        "[SENSOR] HC-SR04 trigger GPIO{}, echo GPIO{}",
        config::ULTRASONIC_TRIGGER_PIN,
        config::ULTRASONIC_ECHO_PIN
    );
    // Keep in sync with config::ULTRASONIC_*_PIN
    let trigger = Output::new(peripherals.GPIO6, Level::Low, OutputConfig::default());
    let echo = Input::new(
        peripherals.GPIO7,
        InputConfig::default().with_pull(Pull::Down),
    );
    let sensor = Ultrasonic::new(trigger, echo, Delay::new(), SystemClock);

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        println!("[MAIN] Spawning monitor task...");
        spawner.spawn(monitor_task(sensor, lights, &TRAFFIC)).ok();

        println!("[MAIN] Spawning sequencer task...");
        match spawner.spawn(sequencer_task(lights, &TRAFFIC)) {
            Ok(_) => println!("[MAIN] ✅ Traffic light running"),
            Err(e) => println!("[MAIN] ❌ Failed to spawn sequencer task: {:?}", e),
        }
    });
}
