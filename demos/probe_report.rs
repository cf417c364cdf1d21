use clap::Parser;
use clap::ValueEnum;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use swiss_probe::DefaultHashBuilder;
use swiss_probe::Group;
use swiss_probe::Group8;
use swiss_probe::Group16;
use swiss_probe::Policy;
use swiss_probe::SetPolicy;
use swiss_probe::SwissTable;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Width {
    #[value(name = "8")]
    Eight,
    #[value(name = "16")]
    Sixteen,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'n', long = "elements", default_value_t = 1000)]
    elements: usize,

    /// Percentage of the inserted elements to remove afterwards.
    #[arg(short = 'r', long = "remove_percent", default_value_t = 0)]
    remove_percent: u8,

    #[arg(short = 'w', long = "group_width", value_enum, default_value_t = Width::Sixteen)]
    group_width: Width,

    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,
}

fn report<G: Group>(args: &Args) {
    let policy = SetPolicy::<u64, DefaultHashBuilder>::default();
    let mut rng = match args.seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_os_rng(),
    };

    println!(
        "Filling SwissTable ({}-wide groups) with {} random u64 keys",
        G::WIDTH,
        args.elements
    );

    let mut table = SwissTable::<u64, G>::empty();
    let mut keys = Vec::with_capacity(args.elements);
    for _ in 0..args.elements {
        let key: u64 = rng.random();
        if table.find(policy.hash(&key), |&v| v == key).is_some() {
            continue;
        }
        table.insert_unique(policy.hash(&key), key, |v| policy.hash(v));
        keys.push(key);
    }

    let to_remove = keys.len() * usize::from(args.remove_percent.min(100)) / 100;
    for key in keys.iter().take(to_remove) {
        table.remove(policy.hash(key), |v| v == key);
    }

    println!("Elements: {}", table.len());
    println!("Capacity: {}", table.capacity());
    println!(
        "Load factor: {:.2}%",
        table.len() as f64 / table.capacity().max(1) as f64 * 100.0
    );

    let view = table.view();
    swiss_probe::probe_histogram(&policy, &view).print();
    swiss_probe::probe_summary(&policy, &view).print();

    println!(
        "Allocated bytes: {}",
        swiss_probe::allocated_bytes(&policy, &view)
    );
    println!(
        "Lower bound for {} elements: {}",
        table.len(),
        swiss_probe::lower_bound_allocated_bytes_for::<G, _>(&policy, table.len())
    );
}

fn main() {
    let args = Args::parse();

    match args.group_width {
        Width::Eight => report::<Group8>(&args),
        Width::Sixteen => report::<Group16>(&args),
    }
}
