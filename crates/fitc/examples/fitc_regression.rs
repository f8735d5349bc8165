use env_logger::{Builder, Env};
use fitc_gp::correlation_models::Matern52Corr;
use fitc_gp::kernels::StationaryKernel;
use fitc_gp::mean_models::ConstantMean;
use fitc_gp::{FitcParams, Inducings, FITC_LOG};
use linfa::prelude::*;
use ndarray::{array, Array, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

/// Noisy x.sin(x) sampled on [0, 25]
fn main() {
    let env = Env::new().filter_or(FITC_LOG, "info");
    let mut builder = Builder::from_env(env);
    let builder = builder.target(env_logger::Target::Stdout);
    builder.try_init().ok();

    let mut rng = Xoshiro256Plus::seed_from_u64(0);
    let xtrain = Array::linspace(0., 25., 200).insert_axis(Axis(1));
    let noise = Array::random_using(200, Normal::new(0., 0.5).unwrap(), &mut rng);
    let ytrain = xtrain.column(0).mapv(|x: f64| x * x.sin()) + noise;

    let mut fitc = FitcParams::new(
        StationaryKernel::new(Matern52Corr(), array![0.5]),
        ConstantMean::new(0.),
        Inducings::Randomized(30),
    )
    .log_scale(5f64.ln())
    .noise_sigma(0.5)
    .seed(Some(42))
    .fit(&Dataset::new(xtrain, ytrain))
    .expect("FITC fitting");

    let nlml = fitc
        .negative_log_marginal_likelihood()
        .expect("FITC likelihood");
    println!("{fitc}");
    println!("negative log marginal likelihood = {nlml}");
    for param in ["theta_0"] {
        let d = fitc
            .derivative_wrt_kernel_parameter(param)
            .expect("FITC kernel derivative");
        println!("d(nlml)/d({param}) = {d}");
    }
    for param in ["log_scale", "log_inducing_noise"] {
        let d = fitc
            .derivative_wrt_inference_parameter(param)
            .expect("FITC inference derivative");
        println!("d(nlml)/d({param}) = {d}");
    }
    let d = fitc
        .derivative_wrt_likelihood_parameter("log_sigma")
        .expect("FITC likelihood derivative");
    println!("d(nlml)/d(log_sigma) = {d}");
    let d = fitc
        .derivative_wrt_mean_parameter("mean")
        .expect("FITC mean derivative");
    println!("d(nlml)/d(mean) = {d}");

    let xtest = Array::linspace(0., 25., 11).insert_axis(Axis(1));
    let ytest = fitc.predict(&xtest).expect("FITC prediction");
    let vtest = fitc.predict_var(&xtest).expect("FITC variance");
    for ((x, y), v) in xtest.iter().zip(ytest.iter()).zip(vtest.iter()) {
        println!("x={x:>5.1} y={y:>8.3} (expected {:>8.3}) std={:.3}", x * x.sin(), v.sqrt());
    }
}
