//! Ultrasonic distance telemetry over MQTT
//!
//! Joins the configured Wi-Fi network, samples the HC-SR04 once a second and
//! publishes each reading (centimeters, two decimals) to the public broker.
//! Lost links on either layer are retried forever.

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{Config, Runner, Stack, StackResources};
use embassy_time::{Duration, Instant, Timer, with_timeout};
use embedded_io_async::{Read, Write};
use esp_hal::clock::CpuClock;
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::rng::Rng;
use esp_hal::timer::timg::TimerGroup;
use esp_hal_embassy::Executor;
use esp_println::println;
use esp_wifi::wifi::{self, WifiDevice};
use static_cell::StaticCell;

use iot_lab::mqtt::{self, ConnectReturnCode, Packets};
use iot_lab::telemetry::{self, ClientId, DistanceSignal, KeepAlive};
use iot_lab::ultrasonic::{SystemClock, Ultrasonic};
use iot_lab::wifi::WiFiManager;
use iot_lab::{BoardError, config};

// Add app descriptor for espflash compatibility
esp_bootloader_esp_idf::esp_app_desc!();

type Sensor = Ultrasonic<Output<'static>, Input<'static>, Delay, SystemClock>;

const MQTT_BUFFER_SIZE: usize = 256;
const TCP_BUFFER_SIZE: usize = 1024;

static WIFI_INIT_CELL: StaticCell<esp_wifi::EspWifiController<'static>> = StaticCell::new();
static STACK_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
static EXECUTOR: StaticCell<Executor> = StaticCell::new();
static READINGS: DistanceSignal = DistanceSignal::new();

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("[PANIC] {}", info);
    loop {}
}

// Embassy task to run the network stack
#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) -> ! {
    runner.run().await
}

/// Keeps the station associated, rejoining after every drop
#[embassy_executor::task]
async fn connection_task(mut wifi_manager: WiFiManager<'static>) -> ! {
    loop {
        match wifi_manager
            .connect(config::WIFI_SSID, config::WIFI_PASSWORD)
            .await
        {
            Ok(()) => {
                match wifi_manager.wait_for_ip().await {
                    Ok(ip) => println!(
                        "[WIFI] IP address: {}.{}.{}.{}",
                        ip[0], ip[1], ip[2], ip[3]
                    ),
                    Err(e) => println!("[WIFI] No DHCP lease: {:?}", e),
                }
                wifi_manager.wait_for_disconnect().await;
            }
            Err(e) => println!("[WIFI] Connection attempt failed: {:?}", e),
        }

        println!(
            "[WIFI] Retrying in {} ms...",
            config::WIFI_RECONNECT_INTERVAL_MS
        );
        Timer::after(Duration::from_millis(config::WIFI_RECONNECT_INTERVAL_MS)).await;
    }
}

#[embassy_executor::task]
async fn sensor_task(mut sensor: Sensor) -> ! {
    loop {
        match sensor.measure(config::ULTRASONIC_MAX_DISTANCE_M) {
            Ok(distance_m) => {
                let distance_cm = telemetry::meters_to_cm(distance_m);
                println!("[SENSOR] Distance: {:.2} cm", distance_cm);
                READINGS.signal(distance_cm);
            }
            Err(err) => println!("[SENSOR] {}", err),
        }

        Timer::after(Duration::from_millis(config::TELEMETRY_SAMPLE_PERIOD_MS)).await;
    }
}

#[embassy_executor::task]
async fn mqtt_task(stack: Stack<'static>, client_id: ClientId) -> ! {
    let mut rx_buffer = [0u8; TCP_BUFFER_SIZE];
    let mut tx_buffer = [0u8; TCP_BUFFER_SIZE];

    println!("[MQTT] Client id: {}", client_id.as_str());

    loop {
        stack.wait_config_up().await;

        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(Duration::from_secs(10)));

        if let Err(e) = run_session(stack, &mut socket, client_id.as_str()).await {
            println!("[MQTT] Session ended: {:?}", e);
        }
        if socket.may_send() {
            disconnect(&mut socket).await;
        }
        socket.abort();
        // Let the abort reach the peer before the buffers are reused
        let _ = socket.flush().await;
        drop(socket);

        println!(
            "[MQTT] Reconnecting in {} ms...",
            config::MQTT_RECONNECT_INTERVAL_MS
        );
        Timer::after(Duration::from_millis(config::MQTT_RECONNECT_INTERVAL_MS)).await;
    }
}

/// One broker connection: resolve, CONNECT, then publish until something fails
async fn run_session(
    stack: Stack<'static>,
    socket: &mut TcpSocket<'_>,
    client_id: &str,
) -> Result<(), BoardError> {
    let addresses = stack
        .dns_query(config::MQTT_BROKER_HOST, DnsQueryType::A)
        .await
        .map_err(|e| {
            println!("[MQTT] DNS lookup failed: {:?}", e);
            BoardError::NetworkError
        })?;
    let broker = *addresses.first().ok_or(BoardError::NetworkError)?;

    println!(
        "[MQTT] Connecting to {} ({}:{})...",
        config::MQTT_BROKER_HOST,
        broker,
        config::MQTT_BROKER_PORT
    );
    socket
        .connect((broker, config::MQTT_BROKER_PORT))
        .await
        .map_err(|e| {
            println!("[MQTT] TCP connect failed: {:?}", e);
            BoardError::NetworkError
        })?;

    let mut packet = [0u8; MQTT_BUFFER_SIZE];
    let len = mqtt::encode_connect(&mut packet, client_id, config::MQTT_KEEP_ALIVE_SECS)?;
    send(socket, &packet[..len]).await?;

    let mut connack = [0u8; 4];
    socket
        .read_exact(&mut connack)
        .await
        .map_err(|_| BoardError::NetworkError)?;
    match mqtt::decode_connack(&connack)? {
        ConnectReturnCode::Accepted => println!("[MQTT] ✅ Connected to broker"),
        code => {
            println!("[MQTT] ❌ Broker refused connection: {:?}", code);
            return Err(BoardError::MqttError);
        }
    }

    let mut keep_alive = KeepAlive::new(config::MQTT_KEEP_ALIVE_SECS, now_ms());
    let wait = Duration::from_millis(config::TELEMETRY_WAIT_TIMEOUT_MS);

    loop {
        match with_timeout(wait, READINGS.wait()).await {
            Ok(distance_cm) => {
                let payload = telemetry::format_distance(distance_cm)?;
                let len =
                    mqtt::encode_publish(&mut packet, config::MQTT_TOPIC, payload.as_bytes())?;
                send(socket, &packet[..len]).await?;
                keep_alive.record_sent(now_ms());
                println!(
                    "[MQTT] Published {} to {}",
                    payload.as_str(),
                    config::MQTT_TOPIC
                );

                drain_inbound(socket).await?;
                Timer::after(Duration::from_millis(config::TELEMETRY_PUBLISH_PERIOD_MS)).await;
            }
            Err(_) => {
                // Timeout - no fresh reading, keep the session alive
                if keep_alive.ping_due(now_ms()) {
                    let len = mqtt::encode_pingreq(&mut packet)?;
                    send(socket, &packet[..len]).await?;
                    keep_alive.record_sent(now_ms());
                    println!("[MQTT] PINGREQ sent");
                }
                drain_inbound(socket).await?;
            }
        }
    }
}

async fn send(socket: &mut TcpSocket<'_>, bytes: &[u8]) -> Result<(), BoardError> {
    socket.write_all(bytes).await.map_err(|e| {
        println!("[MQTT] Write failed: {:?}", e);
        BoardError::NetworkError
    })?;
    socket.flush().await.map_err(|_| BoardError::NetworkError)
}

/// Consume whatever the broker sent (PINGRESP mostly) without blocking
///
/// A packet split across reads is reassembled in `buf`; anything still
/// partial when the socket runs dry is dropped.
async fn drain_inbound(socket: &mut TcpSocket<'_>) -> Result<(), BoardError> {
    let mut buf = [0u8; 128];
    let mut filled = 0;

    while socket.can_recv() {
        let n = socket
            .read(&mut buf[filled..])
            .await
            .map_err(|_| BoardError::NetworkError)?;
        if n == 0 {
            println!("[MQTT] Broker closed the connection");
            return Err(BoardError::NetworkError);
        }
        filled += n;

        let rest = {
            let mut packets = Packets::new(&buf[..filled]);
            for header in packets.by_ref() {
                println!("[MQTT] Received {:?}", header.packet_type);
            }
            packets.remainder()
        };
        buf.copy_within(filled - rest..filled, 0);
        filled = rest;

        if filled == buf.len() {
            println!("[MQTT] Skipped {} unparseable bytes", filled);
            filled = 0;
        }
    }

    if filled > 0 {
        println!("[MQTT] Dropped {} bytes of a partial packet", filled);
    }

    // FIN with no data behind it
    if !socket.may_recv() {
        println!("[MQTT] Broker closed the connection");
        return Err(BoardError::NetworkError);
    }

    Ok(())
}

/// Best effort DISCONNECT so the broker drops the session at once
async fn disconnect(socket: &mut TcpSocket<'_>) {
    let mut packet = [0u8; 2];
    if let Ok(len) = mqtt::encode_disconnect(&mut packet) {
        if send(socket, &packet[..len]).await.is_ok() {
            println!("[MQTT] DISCONNECT sent");
        }
    }
}

fn now_ms() -> u64 {
    Instant::now().as_millis()
}

#[esp_hal::main]
fn main() -> ! {
    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    // Initialize heap allocator for WiFi (72KB)
    esp_alloc::heap_allocator!(size: 72 * 1024);

    // Initialize embassy time system
    let timer_group0 = TimerGroup::new(peripherals.TIMG0);
    esp_hal_embassy::init(timer_group0.timer0);

    // Seeds are drawn before the RNG moves into the radio driver
    let mut rng = Rng::new(peripherals.RNG);
    let net_seed = (u64::from(rng.random()) << 32) | u64::from(rng.random());
    let client_id = telemetry::client_id(rng.random()).expect("client id fits in 23 bytes");

    let timer_group1 = TimerGroup::new(peripherals.TIMG1);
    let wifi_init = esp_wifi::init(timer_group1.timer0, rng, peripherals.RADIO_CLK)
        .expect("WiFi driver initialization failed");
    println!("[WIFI] WiFi driver initialized successfully");

    let wifi_init_ref = WIFI_INIT_CELL.init(wifi_init);
    let (wifi_controller, wifi_interfaces) =
        wifi::new(wifi_init_ref, peripherals.WIFI).expect("WiFi controller creation failed");

    let stack_resources = STACK_RESOURCES.init(StackResources::new());
    let (stack, runner) = embassy_net::new(
        wifi_interfaces.sta,
        Config::dhcpv4(Default::default()),
        stack_resources,
        net_seed,
    );
    println!("[WIFI] Embassy-net stack created with DHCP configuration");

    let mut wifi_manager = WiFiManager::new(wifi_controller);
    wifi_manager.set_stack(stack);

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
    executor.run(|spawner| spawn_tasks(spawner, runner, wifi_manager, sensor, stack, client_id));
}

fn spawn_tasks(
    spawner: Spawner,
    runner: Runner<'static, WifiDevice<'static>>,
    wifi_manager: WiFiManager<'static>,
    sensor: Sensor,
    stack: Stack<'static>,
    client_id: ClientId,
) {
    println!("[MAIN] Spawning network task...");
    spawner.spawn(net_task(runner)).ok();

    println!("[MAIN] Spawning WiFi connection task...");
    spawner.spawn(connection_task(wifi_manager)).ok();

    println!("[MAIN] Spawning sensor task...");
    spawner.spawn(sensor_task(sensor)).ok();

    println!("[MAIN] Spawning MQTT task...");
    match spawner.spawn(mqtt_task(stack, client_id)) {
        Ok(_) => println!("[MAIN] ✅ Telemetry running"),
        Err(e) => println!("[MAIN] ❌ Failed to spawn MQTT task: {:?}", e),
    }
}
