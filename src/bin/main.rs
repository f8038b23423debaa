use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use redisz::config::{self, ApplicationConfig};
use redisz::monitor::init_logging;
use redisz::redis::{ConnectionSpec, SetOptions, Topology};
use redisz::Client;
use tokio::signal;
use tracing::{info, warn};

/// redisz 命令列工具
#[derive(Debug, Parser)]
#[command(name = "redisz", version, about = "Redis 便利客戶端命令列工具")]
struct Cli {
    /// 連接字串，覆寫配置檔中的 redis.url
    #[arg(long, global = true, env = "REDISZ_URL")]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 測試連接
    Ping,
    /// 解析連接字串並顯示部署拓撲，不建立連接
    Topology,
    /// 顯示鍵的類型
    Type { name: String },
    /// 讀取任意類型的值並以 JSON 輸出
    Get { name: String },
    /// 設定字串值
    Set {
        name: String,
        value: String,
        /// 過期秒數
        #[arg(long)]
        ex: Option<u64>,
        /// 僅在鍵不存在時設定
        #[arg(long)]
        nx: bool,
    },
    /// 刪除鍵
    Del {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// 列出符合模式的鍵，單機與哨兵使用 SCAN，集群使用 KEYS
    Keys {
        #[arg(default_value = "*")]
        pattern: String,
    },
    /// 剩餘存活秒數
    Ttl { name: String },
    /// 設定過期秒數
    Expire { name: String, seconds: i64 },
    /// 發布訊息
    Publish { channel: String, message: String },
    /// 訂閱頻道，收到 `exit` 或 Ctrl-C 時結束
    Subscribe {
        #[arg(required = true)]
        channels: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化配置，載入失敗時使用預設值
    let mut app_config = match config::init_config() {
        Ok(config) => config.clone(),
        Err(e) => {
            eprintln!("配置載入失敗，使用預設值: {}", e);
            ApplicationConfig::default()
        }
    };
    if let Some(url) = cli.url {
        app_config.redis.url = url;
    }

    // 初始化日誌系統
    let _guard = init_logging(&app_config.log).map_err(|e| anyhow!("設置日誌系統失敗: {}", e))?;

    if let Command::Topology = cli.command {
        print_topology(&ConnectionSpec::parse(&app_config.redis.url)?);
        return Ok(());
    }

    let client = Client::new(app_config.redis.clone())
        .await
        .with_context(|| format!("無法連接 Redis ({})", app_config.redis.url))?;
    info!("已連接 Redis，拓撲: {}", client.topology());

    run(&client, cli.command).await
}

fn print_topology(spec: &ConnectionSpec) {
    println!("topology: {}", spec.topology);
    for node in &spec.nodes {
        println!("node: {}", node);
    }
    println!("db: {}", spec.db);
    println!("url: {}", spec);
}

async fn run(client: &Client, command: Command) -> Result<()> {
    match command {
        Command::Ping => println!("{}", client.ping().await?),
        Command::Topology => print_topology(client.spec()),
        Command::Type { name } => println!("{}", client.get_type(&name).await?),
        Command::Get { name } => match client.get_value(&name).await? {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => println!("(nil)"),
        },
        Command::Set { name, value, ex, nx } => {
            let options = SetOptions {
                ex,
                nx,
                ..SetOptions::default()
            };
            let written = client.str_set(&name, value, options).await?;
            println!("{}", if written { "OK" } else { "(nil)" });
        }
        Command::Del { names } => println!("{}", client.delete(&names).await?),
        // 集群的 SCAN 只涵蓋單一節點，改用會彙整所有主節點的 KEYS
        Command::Keys { pattern } if *client.topology() == Topology::Cluster => {
            for key in client.keys(&pattern).await? {
                println!("{}", key);
            }
        }
        Command::Keys { pattern } => {
            let mut keys = client.scan_iter(Some(&pattern), None);
            while let Some(key) = keys.try_next().await? {
                println!("{}", key);
            }
        }
        Command::Ttl { name } => println!("{}", client.ttl(&name).await?),
        Command::Expire { name, seconds } => println!("{}", client.expire(&name, seconds).await?),
        Command::Publish { channel, message } => {
            println!("{}", client.publish(&channel, message).await?)
        }
        Command::Subscribe { channels } => {
            info!("訂閱頻道: {}", channels.join(", "));
            let listener = client.subscribe(&channels, |msg| {
                println!("[{}] {}", msg.channel, msg.payload);
                msg.payload != "exit"
            });

            tokio::select! {
                result = listener => result?,
                _ = signal::ctrl_c() => warn!("收到中斷信號，停止訂閱"),
            }
        }
    }
    Ok(())
}
